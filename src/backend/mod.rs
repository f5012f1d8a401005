//! Storage abstraction for archive entries.
//!
//! The query engine only depends on [`EntryStore`]; [`SqliteStore`] is the
//! store shipped with the crate.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::query::EntryQuery;
use chrono::{DateTime, Utc};

/// Persistent collection of entries.
///
/// Implementations must be safe to share between threads. Reads see a
/// consistent snapshot for the duration of one call.
pub trait EntryStore: Send + Sync {
    /// Run a query built by [`crate::query::build_entry_query`], returning
    /// entries in query order with contributors loaded.
    fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>, ArchiveError>;

    /// Look up one entry by id.
    fn get_entry(&self, id: i64) -> Result<Option<Entry>, ArchiveError>;

    /// Insert or update entries, assigning ids to new ones in place.
    ///
    /// Entries are normalised and validated first; nothing is written if any
    /// is invalid. Ids are assigned only once the whole batch is committed.
    fn add_entries(&self, entries: &mut [Entry]) -> Result<(), ArchiveError>;

    /// Replace an existing entry, normalising it in place. Its id is never changed.
    fn update_entry(&self, entry: &mut Entry) -> Result<(), ArchiveError>;

    /// Remove an entry and its contributor links.
    fn delete_entry(&self, id: i64) -> Result<(), ArchiveError>;

    /// Creation date of the newest entry, if any.
    fn latest_create_date(&self) -> Result<Option<DateTime<Utc>>, ArchiveError>;
}
