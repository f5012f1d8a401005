//! Query execution and pagination.

use crate::backend::EntryStore;
use crate::config::{ModeDefaults, PAGE_SIZE};
use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::query::builder::build_entry_query;
use crate::query::filter::{build_filter, FilterSpec};
use crate::query::tokens::{join_raw, parse_tokens};
use serde::Serialize;

/// Ordered matches of one search, plus what a presenter needs to page them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// Every match, in final order
    pub results: Vec<Entry>,
    pub page: i64,
    pub page_size: usize,
    /// Source text of the non-page tokens of the query
    pub non_page_tokens: Vec<String>,
}

impl QueryResult {
    /// Number of pages, at least 1 when there are results.
    pub fn max_page(&self) -> usize {
        self.results.len().div_ceil(self.page_size.max(1))
    }

    pub fn page_valid(&self) -> bool {
        self.page >= 1 && (self.page as u64) <= self.max_page() as u64
    }

    /// Entries on the requested page.
    ///
    /// A single match is always returned, whatever page was asked for.
    pub fn page_entries(&self) -> &[Entry] {
        if self.results.len() == 1 {
            return &self.results;
        }
        if !self.page_valid() {
            return &[];
        }
        let start = (self.page as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(self.results.len());
        &self.results[start..end]
    }

    /// 1-based rank of the first entry on the page.
    pub fn first_rank(&self) -> usize {
        if self.results.len() <= 1 || !self.page_valid() {
            1
        } else {
            (self.page as usize - 1) * self.page_size + 1
        }
    }

    /// Arguments that request the next page, if there is one.
    pub fn next_page_command(&self) -> Option<String> {
        if self.results.len() > 1 && self.page_valid() && (self.page as usize) < self.max_page() {
            Some(self.page_command(self.page + 1))
        } else {
            None
        }
    }

    /// Arguments that request the previous page, if there is one.
    pub fn previous_page_command(&self) -> Option<String> {
        if self.results.len() > 1 && self.page_valid() && self.page > 1 {
            Some(self.page_command(self.page - 1))
        } else {
            None
        }
    }

    fn page_command(&self, page: i64) -> String {
        let page = page.to_string();
        join_raw(std::iter::once(page.as_str()).chain(self.non_page_tokens.iter().map(String::as_str)))
    }
}

/// Run a filter against the store with the default page size.
pub fn execute_query(store: &dyn EntryStore, spec: &FilterSpec) -> Result<QueryResult, ArchiveError> {
    execute_query_paged(store, spec, PAGE_SIZE)
}

/// Run a filter against the store.
///
/// Fails with [`ArchiveError::NoResults`] when nothing matches, and with
/// [`ArchiveError::InvalidPage`] when two or more entries match but the
/// requested page is out of range.
pub fn execute_query_paged(
    store: &dyn EntryStore,
    spec: &FilterSpec,
    page_size: usize,
) -> Result<QueryResult, ArchiveError> {
    let query = build_entry_query(spec);
    let results = store.fetch_entries(&query)?;
    tracing::debug!(matches = results.len(), page = spec.page, "executed query");

    let result = QueryResult {
        results,
        page: spec.page,
        page_size: page_size.max(1),
        non_page_tokens: spec.non_page_tokens.clone(),
    };

    match result.results.len() {
        0 => Err(ArchiveError::NoResults),
        1 => Ok(result),
        _ if !result.page_valid() => Err(ArchiveError::InvalidPage {
            page: result.page,
            max_page: result.max_page(),
        }),
        _ => Ok(result),
    }
}

/// Parse, build and execute in one step.
pub fn search_archive(
    store: &dyn EntryStore,
    raw: &str,
    defaults: ModeDefaults,
) -> Result<QueryResult, ArchiveError> {
    let tokens = parse_tokens(raw)?;
    let spec = build_filter(&tokens, defaults)?;
    execute_query(store, &spec)
}
