//! maparchive - search and curate an archive of map-art builds.
//!
//! Entries describe user-built pixel-art ("map-art"): dimensions, build
//! technique, palette, name, artists and provenance. The heart of the crate is
//! a small argument language that turns loose user input into a typed filter
//! and a query executor that runs that filter against the archive.
//!
//! # Quick Start
//!
//! ```no_run
//! use maparchive::backend::SqliteStore;
//! use maparchive::config::ModeDefaults;
//! use maparchive::query::search_archive;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::open(std::path::Path::new("map_art.db"))?;
//! let result = search_archive(&store, "-f artist:\"Jane Doe\" 2", ModeDefaults::biggest())?;
//! for entry in result.page_entries() {
//!     println!("{}", entry.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`backend`] - Entry store trait and the SQLite store
//! - [`classifier`] - Technique and palette enumerations with fuzzy resolution
//! - [`config`] - Archive configuration and per-mode defaults
//! - [`edit`] - Field edits on entries selected by a search
//! - [`entry`] - The archived entry record
//! - [`error`] - Error types
//! - [`output`] - Response types and formatting
//! - [`query`] - Tokenizer, filter builder and query executor

pub mod backend;
pub mod classifier;
pub mod config;
pub mod edit;
pub mod entry;
pub mod error;
pub mod output;
pub mod query;

pub use backend::{EntryStore, SqliteStore};
pub use classifier::{resolve_palette, resolve_technique, Classifier, Palette, Technique};
pub use config::{ArchiveConfig, ModeDefaults, SearchMode};
pub use edit::{edit_matching, EntryEdit};
pub use entry::{Entry, Provenance};
pub use error::ArchiveError;
pub use query::{
    build_filter, execute_query, parse_tokens, search_archive, FilterSpec, QueryResult, Token,
};

use serde::Serialize;
use std::fmt;

/// Primary ordering of search results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    /// Largest builds first, ties broken by oldest first
    Size,
    /// Oldest builds first
    #[default]
    Date,
}

impl OrderBy {
    /// Parse the value of an `order:` argument (already stripped of `-`).
    pub fn from_arg(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "size" => Some(OrderBy::Size),
            "date" => Some(OrderBy::Date),
            _ => None,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OrderBy::Size => "size",
            OrderBy::Date => "date",
        };
        write!(f, "{}", value)
    }
}
