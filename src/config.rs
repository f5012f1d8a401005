//! Archive configuration.
//!
//! Values come from built-in defaults, optionally overridden by environment
//! variables:
//!
//! - `MAPARCHIVE_GUILD` - guild id used when rendering permalinks
//! - `MAPARCHIVE_CHANNEL` - archive channel id used when rendering permalinks
//! - `MAPARCHIVE_DB` - default database path (read by the CLI)

use crate::error::ArchiveError;
use crate::OrderBy;
use serde::Serialize;

/// Number of entries shown per result page.
pub const PAGE_SIZE: usize = 10;

/// Default guild hosting the archive channel.
pub const DEFAULT_GUILD_ID: u64 = 349201680023289867;

/// Default archive channel.
pub const DEFAULT_CHANNEL_ID: u64 = 349277718954901514;

/// Minimum size shown by the biggest ranking when no filter is given.
pub const BIGGEST_MIN_SIZE: u32 = 32;

/// Size floor applied when only flat builds are filtered out.
pub const FLAT_FILTER_MIN_SIZE: u32 = 8;

/// Defaults a search front-end applies when the user leaves them unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeDefaults {
    pub min_size: u32,
    pub order_by: OrderBy,
}

impl ModeDefaults {
    /// Plain search: everything, oldest first.
    pub const fn search() -> Self {
        Self {
            min_size: 0,
            order_by: OrderBy::Date,
        }
    }

    /// Ranking of the largest builds.
    pub const fn biggest() -> Self {
        Self {
            min_size: BIGGEST_MIN_SIZE,
            order_by: OrderBy::Size,
        }
    }
}

/// The two consumers of the filter language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Search,
    Biggest,
}

/// Archive-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub guild_id: u64,
    pub channel_id: u64,
    pub page_size: usize,
    pub search: ModeDefaults,
    pub biggest: ModeDefaults,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            guild_id: DEFAULT_GUILD_ID,
            channel_id: DEFAULT_CHANNEL_ID,
            page_size: PAGE_SIZE,
            search: ModeDefaults::search(),
            biggest: ModeDefaults::biggest(),
        }
    }
}

impl ArchiveConfig {
    /// Build the configuration from defaults and environment overrides.
    pub fn from_env() -> Result<Self, ArchiveError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ArchiveError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("MAPARCHIVE_GUILD") {
            config.guild_id = parse_id("MAPARCHIVE_GUILD", &value)?;
        }
        if let Some(value) = lookup("MAPARCHIVE_CHANNEL") {
            config.channel_id = parse_id("MAPARCHIVE_CHANNEL", &value)?;
        }
        Ok(config)
    }

    /// Defaults for the given mode.
    pub fn defaults_for(&self, mode: SearchMode) -> ModeDefaults {
        match mode {
            SearchMode::Search => self.search,
            SearchMode::Biggest => self.biggest,
        }
    }
}

fn parse_id(key: &str, value: &str) -> Result<u64, ArchiveError> {
    value
        .trim()
        .parse()
        .map_err(|_| ArchiveError::usage(format!("{} must be a numeric id, got '{}'", key, value)))
}
