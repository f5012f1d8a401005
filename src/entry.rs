//! The archived map-art record.

use crate::classifier::{Palette, Technique};
use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Metadata owned by the archive maintenance workflow.
///
/// The query engine reads these but never changes them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Provenance {
    /// User who posted the originating message
    #[serde(default)]
    pub author_id: i64,
    /// When the originating message was posted
    #[serde(default)]
    pub create_date: DateTime<Utc>,
    /// First image attached to the originating message
    #[serde(default)]
    pub image_url: String,
    /// Image is marked as sensitive
    #[serde(default)]
    pub flagged: bool,
}

/// One archived map-art.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Assigned by the store on first insert
    #[serde(default)]
    pub id: Option<i64>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub technique: Technique,
    #[serde(default)]
    pub palette: Palette,
    pub name: String,
    pub contributors: Vec<String>,
    #[serde(default)]
    pub notes: String,
    pub source_message_id: i64,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Entry {
    /// Number of maps the build covers. Always derived, never stored.
    pub fn total_units(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Trim the name and artist names, and drop repeated artists.
    ///
    /// Artists are an ordered set: the first occurrence of a name keeps its place.
    pub fn normalize(&mut self) {
        let trimmed = self.name.trim();
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_string();
        }
        let mut seen = HashSet::new();
        self.contributors = std::mem::take(&mut self.contributors)
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect();
    }

    /// Check the invariants a persisted entry must hold.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        if self.width < 1 || self.height < 1 {
            return Err(ArchiveError::InvalidEntry {
                reason: format!(
                    "size {}x{} must be at least 1x1 for '{}'",
                    self.width, self.height, self.name
                ),
            });
        }
        if self.name.trim().is_empty() {
            return Err(ArchiveError::InvalidEntry {
                reason: format!("entry from message {} has no name", self.source_message_id),
            });
        }
        if self.contributors.is_empty() {
            return Err(ArchiveError::InvalidEntry {
                reason: format!("'{}' has no artists", self.name),
            });
        }
        if self.contributors.iter().any(|name| name.trim().is_empty()) {
            return Err(ArchiveError::InvalidEntry {
                reason: format!("'{}' has a blank artist name", self.name),
            });
        }
        Ok(())
    }

    /// Link to the originating message in the archive channel.
    pub fn permalink(&self, config: &ArchiveConfig) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            config.guild_id, config.channel_id, self.source_message_id
        )
    }

    /// Artists joined as prose: "A", "A and B", "A, B, and C".
    pub fn contributors_display(&self) -> String {
        match self.contributors.as_slice() {
            [] => String::new(),
            [only] => only.clone(),
            [first, second] => format!("{} and {}", first, second),
            [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
        }
    }

    /// One-line summary used in result listings.
    pub fn line(&self, config: &ArchiveConfig) -> String {
        let total = self.total_units();
        format!(
            "{} x {} ({} {}) - [{}, {}] - [**{}**]({}) by **{}**",
            self.width,
            self.height,
            total,
            if total == 1 { "map" } else { "maps" },
            self.technique,
            self.palette,
            self.name,
            self.permalink(config),
            self.contributors_display()
        )
    }
}
