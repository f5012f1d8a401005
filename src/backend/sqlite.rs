//! SQLite entry store.

use crate::backend::EntryStore;
use crate::classifier::{Classifier, Palette, Technique};
use crate::entry::{Entry, Provenance};
use crate::error::ArchiveError;
use crate::query::{name_key, EntryQuery, ENTRY_COLUMNS};
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS map_art (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    width       INTEGER NOT NULL CHECK (width >= 1),
    height      INTEGER NOT NULL CHECK (height >= 1),
    technique   TEXT    NOT NULL DEFAULT 'UNKNOWN',
    palette     TEXT    NOT NULL DEFAULT 'UNKNOWN',
    name        TEXT    NOT NULL,
    notes       TEXT    NOT NULL DEFAULT '',
    message_id  INTEGER NOT NULL,
    author_id   INTEGER NOT NULL DEFAULT 0,
    create_date INTEGER NOT NULL DEFAULT 0,
    image_url   TEXT    NOT NULL DEFAULT '',
    flagged     INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_map_art_message ON map_art (message_id);
CREATE INDEX IF NOT EXISTS idx_map_art_create_date ON map_art (create_date);

CREATE TABLE IF NOT EXISTS artist (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL UNIQUE,
    name_key TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_artist_name_key ON artist (name_key);

CREATE TABLE IF NOT EXISTS artist_map_art (
    artist_id INTEGER NOT NULL REFERENCES artist (id),
    map_id    INTEGER NOT NULL REFERENCES map_art (id) ON DELETE CASCADE,
    position  INTEGER NOT NULL,
    PRIMARY KEY (map_id, position)
);
CREATE INDEX IF NOT EXISTS idx_artist_map_art_artist ON artist_map_art (artist_id);
";

/// Entry store backed by one SQLite connection.
///
/// Calls are serialised through a mutex; each call checks the connection
/// out for its whole duration.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open an existing archive database.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        if !path.exists() {
            return Err(ArchiveError::DatabaseNotFound {
                path: path.display().to_string(),
            });
        }
        Self::create(path)
    }

    /// Open a database, creating the file and schema if needed.
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        tracing::debug!(path = %path.display(), "opened archive database");
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, ArchiveError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, ArchiveError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Create tables and indexes. Safe to run on an initialised database.
    pub fn create_schema(&self) -> Result<(), ArchiveError> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn timestamp(date: &DateTime<Utc>) -> i64 {
    date.timestamp_millis()
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let technique: String = row.get(3)?;
    let palette: String = row.get(4)?;
    let millis: i64 = row.get(9)?;
    Ok(Entry {
        id: Some(row.get(0)?),
        width: row.get(1)?,
        height: row.get(2)?,
        technique: Technique::from_identifier(&technique),
        palette: Palette::from_identifier(&palette),
        name: row.get(5)?,
        contributors: Vec::new(),
        notes: row.get(6)?,
        source_message_id: row.get(7)?,
        provenance: Provenance {
            author_id: row.get(8)?,
            create_date: DateTime::from_timestamp_millis(millis).unwrap_or_default(),
            image_url: row.get(10)?,
            flagged: row.get(11)?,
        },
    })
}

fn load_contributors(conn: &Connection, entry: &mut Entry) -> rusqlite::Result<()> {
    let Some(id) = entry.id else {
        return Ok(());
    };
    let mut stmt = conn.prepare_cached(
        "SELECT a.name FROM artist_map_art am
         JOIN artist a ON a.id = am.artist_id
         WHERE am.map_id = ?1
         ORDER BY am.position",
    )?;
    entry.contributors = stmt
        .query_map([id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(())
}

fn artist_id(tx: &Transaction<'_>, name: &str) -> rusqlite::Result<i64> {
    tx.prepare_cached(
        "INSERT INTO artist (name, name_key) VALUES (?1, ?2) ON CONFLICT (name) DO NOTHING",
    )?
    .execute([name, name_key(name).as_str()])?;
    tx.prepare_cached("SELECT id FROM artist WHERE name = ?1")?
        .query_row([name], |row| row.get(0))
}

/// Insert or update one normalised entry and rewrite its artist links. Returns its id.
fn write_entry(tx: &Transaction<'_>, entry: &Entry) -> rusqlite::Result<i64> {
    tx.prepare_cached(
        "INSERT INTO map_art (id, width, height, technique, palette, name, notes,
                              message_id, author_id, create_date, image_url, flagged)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT (id) DO UPDATE SET
             width = excluded.width,
             height = excluded.height,
             technique = excluded.technique,
             palette = excluded.palette,
             name = excluded.name,
             notes = excluded.notes,
             message_id = excluded.message_id,
             author_id = excluded.author_id,
             create_date = excluded.create_date,
             image_url = excluded.image_url,
             flagged = excluded.flagged",
    )?
    .execute(params![
        entry.id,
        entry.width,
        entry.height,
        entry.technique.identifier(),
        entry.palette.identifier(),
        entry.name,
        entry.notes,
        entry.source_message_id,
        entry.provenance.author_id,
        timestamp(&entry.provenance.create_date),
        entry.provenance.image_url,
        entry.provenance.flagged,
    ])?;
    let id = entry.id.unwrap_or_else(|| tx.last_insert_rowid());

    tx.prepare_cached("DELETE FROM artist_map_art WHERE map_id = ?1")?
        .execute([id])?;
    for (position, name) in entry.contributors.iter().enumerate() {
        let artist = artist_id(tx, name)?;
        tx.prepare_cached(
            "INSERT INTO artist_map_art (artist_id, map_id, position) VALUES (?1, ?2, ?3)",
        )?
        .execute(params![artist, id, position as i64])?;
    }
    Ok(id)
}

fn entry_exists(tx: &Transaction<'_>, id: i64) -> rusqlite::Result<bool> {
    tx.prepare_cached("SELECT 1 FROM map_art WHERE id = ?1")?
        .query_row([id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
}

impl EntryStore for SqliteStore {
    fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>, ArchiveError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut entries = {
            let mut stmt = tx.prepare_cached(&query.sql)?;
            let rows = stmt.query_map(params_from_iter(query.params.iter()), entry_from_row)?;
            rows.collect::<rusqlite::Result<Vec<Entry>>>()?
        };
        for entry in &mut entries {
            load_contributors(&tx, entry)?;
        }
        tx.commit()?;
        Ok(entries)
    }

    fn get_entry(&self, id: i64) -> Result<Option<Entry>, ArchiveError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let entry = tx
            .prepare_cached(&format!("SELECT {} FROM map_art m WHERE m.id = ?1", ENTRY_COLUMNS))?
            .query_row([id], entry_from_row)
            .optional()?;
        let entry = match entry {
            Some(mut entry) => {
                load_contributors(&tx, &mut entry)?;
                Some(entry)
            }
            None => None,
        };
        tx.commit()?;
        Ok(entry)
    }

    fn add_entries(&self, entries: &mut [Entry]) -> Result<(), ArchiveError> {
        for entry in entries.iter_mut() {
            entry.normalize();
            entry.validate()?;
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let ids = entries
            .iter()
            .map(|entry| write_entry(&tx, entry))
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        tx.commit()?;
        // ids only become visible once they are committed
        for (entry, id) in entries.iter_mut().zip(ids) {
            entry.id = Some(id);
        }
        tracing::info!(count = entries.len(), "stored entries");
        Ok(())
    }

    fn update_entry(&self, entry: &mut Entry) -> Result<(), ArchiveError> {
        let Some(id) = entry.id else {
            return Err(ArchiveError::InvalidEntry {
                reason: format!("'{}' has no id, store it before updating", entry.name),
            });
        };
        entry.normalize();
        entry.validate()?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        if !entry_exists(&tx, id)? {
            return Err(ArchiveError::EntryNotFound { id });
        }
        write_entry(&tx, entry)?;
        tx.commit()?;
        tracing::info!(id, "updated entry");
        Ok(())
    }

    fn delete_entry(&self, id: i64) -> Result<(), ArchiveError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM artist_map_art WHERE map_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM map_art WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(ArchiveError::EntryNotFound { id });
        }
        tx.commit()?;
        tracing::info!(id, "deleted entry");
        Ok(())
    }

    fn latest_create_date(&self) -> Result<Option<DateTime<Utc>>, ArchiveError> {
        let millis: Option<i64> =
            self.conn()
                .query_row("SELECT MAX(create_date) FROM map_art", [], |row| row.get(0))?;
        Ok(millis.and_then(DateTime::from_timestamp_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::sample_entry;
    use chrono::TimeZone;

    #[test]
    fn test_create_schema_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_schema().unwrap();
        store.create_schema().unwrap();
    }

    #[test]
    fn test_open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteStore::open(&dir.path().join("missing.db")).unwrap_err();
        assert!(matches!(err, ArchiveError::DatabaseNotFound { .. }));
    }

    #[test]
    fn test_add_assigns_ids_and_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut first = sample_entry();
        first.contributors = vec!["Zed".to_string(), "Amy".to_string()];
        first.provenance.create_date = Utc.with_ymd_and_hms(2023, 5, 1, 12, 0, 0).unwrap();
        first.provenance.flagged = true;
        let mut entries = vec![first, sample_entry()];
        store.add_entries(&mut entries).unwrap();

        let id = entries[0].id.expect("id assigned");
        assert_ne!(entries[1].id, Some(id));

        let loaded = store.get_entry(id).unwrap().unwrap();
        assert_eq!(loaded, entries[0]);
        // contributor order is preserved
        assert_eq!(loaded.contributors, vec!["Zed", "Amy"]);
    }

    #[test]
    fn test_add_with_existing_id_updates_in_place() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries = vec![sample_entry()];
        store.add_entries(&mut entries).unwrap();

        entries[0].name = "Sunrise".to_string();
        entries[0].contributors = vec!["Bob".to_string()];
        store.add_entries(&mut entries).unwrap();

        let id = entries[0].id.unwrap();
        let loaded = store.get_entry(id).unwrap().unwrap();
        assert_eq!(loaded.name, "Sunrise");
        assert_eq!(loaded.contributors, vec!["Bob"]);
        assert_eq!(loaded.id, Some(id));
    }

    #[test]
    fn test_invalid_entry_writes_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut bad = sample_entry();
        bad.contributors.clear();
        let mut entries = vec![sample_entry(), bad];
        let err = store.add_entries(&mut entries).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidEntry { .. }));
        assert_eq!(entries[0].id, None);
        assert_eq!(store.latest_create_date().unwrap(), None);
    }

    #[test]
    fn test_contributors_share_one_artist_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries = vec![sample_entry(), sample_entry()];
        store.add_entries(&mut entries).unwrap();
        let artists: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM artist", [], |row| row.get(0))
            .unwrap();
        assert_eq!(artists, 1);
    }

    #[test]
    fn test_repeated_artists_are_stored_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entry = sample_entry();
        entry.contributors = vec!["Bob".to_string(), " Amy".to_string(), "Bob ".to_string()];
        let mut entries = vec![entry];
        store.add_entries(&mut entries).unwrap();

        assert_eq!(entries[0].contributors, vec!["Bob", "Amy"]);
        let loaded = store.get_entry(entries[0].id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded, entries[0]);
    }

    #[test]
    fn test_failed_batch_assigns_no_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON map_art
                 WHEN NEW.name = 'Boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let mut boom = sample_entry();
        boom.name = "Boom".to_string();
        let mut entries = vec![sample_entry(), boom];

        let err = store.add_entries(&mut entries).unwrap_err();
        assert!(matches!(err, ArchiveError::SqliteError(_)));
        assert_eq!(entries[0].id, None);
        assert_eq!(entries[1].id, None);
        assert_eq!(store.latest_create_date().unwrap(), None);
    }

    #[test]
    fn test_artist_rows_carry_folded_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entry = sample_entry();
        entry.contributors = vec!["ÖLAF".to_string()];
        store.add_entries(&mut [entry]).unwrap();
        let key: String = store
            .conn()
            .query_row("SELECT name_key FROM artist WHERE name = 'ÖLAF'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(key, "ölaf");
    }

    #[test]
    fn test_update_requires_existing_entry() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut unsaved = sample_entry();
        assert!(matches!(
            store.update_entry(&mut unsaved).unwrap_err(),
            ArchiveError::InvalidEntry { .. }
        ));

        let mut ghost = sample_entry();
        ghost.id = Some(99);
        assert!(matches!(
            store.update_entry(&mut ghost).unwrap_err(),
            ArchiveError::EntryNotFound { id: 99 }
        ));
    }

    #[test]
    fn test_delete_entry() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries = vec![sample_entry()];
        store.add_entries(&mut entries).unwrap();
        let id = entries[0].id.unwrap();

        store.delete_entry(id).unwrap();
        assert_eq!(store.get_entry(id).unwrap(), None);
        assert!(matches!(
            store.delete_entry(id).unwrap_err(),
            ArchiveError::EntryNotFound { .. }
        ));
    }

    #[test]
    fn test_latest_create_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        let newest = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let mut old = sample_entry();
        old.provenance.create_date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut new = sample_entry();
        new.provenance.create_date = newest;
        store.add_entries(&mut [old, new]).unwrap();
        assert_eq!(store.latest_create_date().unwrap(), Some(newest));
    }

    #[test]
    fn test_unknown_stored_identifier_reads_as_unknown() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries = vec![sample_entry()];
        store.add_entries(&mut entries).unwrap();
        let id = entries[0].id.unwrap();
        store
            .conn()
            .execute("UPDATE map_art SET technique = 'CUBIC' WHERE id = ?1", [id])
            .unwrap();
        let loaded = store.get_entry(id).unwrap().unwrap();
        assert_eq!(loaded.technique, Technique::Unknown);
    }
}
