//! Field edits on archived entries.
//!
//! Entries to edit are selected with the search argument language, using the
//! plain search defaults. An edit names the fields to replace; everything it
//! leaves unset is kept.

use crate::backend::EntryStore;
use crate::classifier::{resolve_or_usage, Palette, Technique};
use crate::config::ModeDefaults;
use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::query::{build_entry_query, build_filter, parse_tokens};
use chrono::{DateTime, Utc};

/// Replacement values for an entry. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdit {
    pub name: Option<String>,
    pub contributors: Option<Vec<String>>,
    pub notes: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub technique: Option<Technique>,
    pub palette: Option<Palette>,
    pub source_message_id: Option<i64>,
    pub author_id: Option<i64>,
    pub image_url: Option<String>,
    pub create_date: Option<DateTime<Utc>>,
}

impl EntryEdit {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set the technique from a loosely typed label.
    pub fn technique_label(mut self, label: &str) -> Result<Self, ArchiveError> {
        self.technique = Some(resolve_or_usage(label, "map type")?);
        Ok(self)
    }

    /// Set the palette from a loosely typed label.
    pub fn palette_label(mut self, label: &str) -> Result<Self, ArchiveError> {
        self.palette = Some(resolve_or_usage(label, "palette")?);
        Ok(self)
    }

    /// Set the creation date from an RFC 3339 timestamp.
    pub fn create_date_text(mut self, text: &str) -> Result<Self, ArchiveError> {
        let date = DateTime::parse_from_rfc3339(text.trim()).map_err(|e| {
            ArchiveError::usage(format!("invalid create date `{}`: {}", text, e))
        })?;
        self.create_date = Some(date.with_timezone(&Utc));
        Ok(self)
    }

    /// Write the set fields into `entry`.
    pub fn apply(&self, entry: &mut Entry) {
        if let Some(name) = &self.name {
            entry.name = name.clone();
        }
        if let Some(contributors) = &self.contributors {
            entry.contributors = contributors.clone();
        }
        if let Some(notes) = &self.notes {
            entry.notes = notes.clone();
        }
        if let Some(width) = self.width {
            entry.width = width;
        }
        if let Some(height) = self.height {
            entry.height = height;
        }
        if let Some(technique) = self.technique {
            entry.technique = technique;
        }
        if let Some(palette) = self.palette {
            entry.palette = palette;
        }
        if let Some(message_id) = self.source_message_id {
            entry.source_message_id = message_id;
        }
        if let Some(author_id) = self.author_id {
            entry.provenance.author_id = author_id;
        }
        if let Some(image_url) = &self.image_url {
            entry.provenance.image_url = image_url.clone();
        }
        if let Some(create_date) = self.create_date {
            entry.provenance.create_date = create_date;
        }
    }
}

/// Apply `edit` to the entries matching `raw` and save them.
///
/// Without `all`, the search must match exactly one entry. The page number of
/// the search is ignored: every match is a candidate. All edited entries are
/// validated before any is written.
pub fn edit_matching(
    store: &dyn EntryStore,
    raw: &str,
    edit: &EntryEdit,
    all: bool,
) -> Result<Vec<Entry>, ArchiveError> {
    if edit.is_empty() {
        return Err(ArchiveError::usage("nothing to edit, name at least one field"));
    }
    let spec = build_filter(&parse_tokens(raw)?, ModeDefaults::search())?;
    let mut entries = store.fetch_entries(&build_entry_query(&spec))?;

    match entries.len() {
        0 => return Err(ArchiveError::NoResults),
        1 => {}
        count if !all => {
            return Err(ArchiveError::usage(format!(
                "multiple results for this search ({}), narrow it down or use --all to edit every match",
                count
            )))
        }
        _ => {}
    }

    for entry in entries.iter_mut() {
        edit.apply(entry);
        entry.normalize();
        entry.validate()?;
    }
    for entry in entries.iter_mut() {
        store.update_entry(entry)?;
    }
    tracing::info!(count = entries.len(), "edited entries");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqliteStore;
    use crate::entry::tests::sample_entry;

    fn store_with(names: &[&str]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entries: Vec<Entry> = names
            .iter()
            .map(|name| {
                let mut entry = sample_entry();
                entry.name = name.to_string();
                entry
            })
            .collect();
        store.add_entries(&mut entries).unwrap();
        store
    }

    #[test]
    fn test_edit_single_match() {
        let store = store_with(&["Spawn Castle", "Harbour"]);
        let edit = EntryEdit {
            name: Some("Spawn Keep".to_string()),
            contributors: Some(vec!["Amy".to_string(), " Bob".to_string()]),
            width: Some(9),
            ..EntryEdit::default()
        }
        .technique_label("semi")
        .unwrap();

        let edited = edit_matching(&store, "castle", &edit, false).unwrap();
        assert_eq!(edited.len(), 1);

        let stored = store.get_entry(edited[0].id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.name, "Spawn Keep");
        assert_eq!(stored.contributors, vec!["Amy", "Bob"]);
        assert_eq!(stored.width, 9);
        assert_eq!(stored.height, 3);
        assert_eq!(stored.technique, Technique::SemiStaircased);
        assert_eq!(stored.palette, Palette::FullColour);
        assert_eq!(stored, edited[0]);
    }

    #[test]
    fn test_multiple_matches_need_all() {
        let store = store_with(&["Castle A", "Castle B"]);
        let edit = EntryEdit {
            notes: Some("moved".to_string()),
            ..EntryEdit::default()
        };
        let err = edit_matching(&store, "castle", &edit, false).unwrap_err();
        assert!(matches!(err, ArchiveError::Usage { .. }));
        assert!(err.to_string().contains("multiple results"));

        let edited = edit_matching(&store, "castle", &edit, true).unwrap();
        assert_eq!(edited.len(), 2);
        assert!(edited.iter().all(|entry| entry.notes == "moved"));
    }

    #[test]
    fn test_invalid_size_writes_nothing() {
        let store = store_with(&["Castle"]);
        let edit = EntryEdit {
            width: Some(0),
            name: Some("Renamed".to_string()),
            ..EntryEdit::default()
        };
        let err = edit_matching(&store, "castle", &edit, false).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidEntry { .. }));
        let still = edit_matching(
            &store,
            "castle",
            &EntryEdit {
                notes: Some("checked".to_string()),
                ..EntryEdit::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(still[0].name, "Castle");
        assert_eq!(still[0].width, 4);
    }

    #[test]
    fn test_no_match_and_empty_edit() {
        let store = store_with(&["Castle"]);
        let edit = EntryEdit {
            notes: Some("x".to_string()),
            ..EntryEdit::default()
        };
        assert!(matches!(
            edit_matching(&store, "dragon", &edit, false),
            Err(ArchiveError::NoResults)
        ));
        assert!(matches!(
            edit_matching(&store, "castle", &EntryEdit::default(), false),
            Err(ArchiveError::Usage { .. })
        ));
    }

    #[test]
    fn test_labels_and_dates_are_resolved() {
        let edit = EntryEdit::default().palette_label("carpet").unwrap();
        assert_eq!(edit.palette, Some(Palette::CarpetOnly));
        assert!(matches!(
            EntryEdit::default().technique_label("cubic"),
            Err(ArchiveError::Usage { .. })
        ));

        let edit = EntryEdit::default()
            .create_date_text("2022-03-01T10:00:00+02:00")
            .unwrap();
        assert_eq!(
            edit.create_date.unwrap().to_rfc3339(),
            "2022-03-01T08:00:00+00:00"
        );
        assert!(EntryEdit::default().create_date_text("yesterday").is_err());
    }
}
