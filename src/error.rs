//! Error types for maparchive.
//!
//! Error codes are organized by category:
//!
//! - **ARC-E001 to ARC-E099**: Database and file I/O errors
//! - **ARC-E100 to ARC-E199**: Argument parsing and usage errors
//! - **ARC-E200 to ARC-E299**: Search result errors
//! - **ARC-E300 to ARC-E399**: Entry validation and maintenance errors
//! - **ARC-E900 to ARC-E999**: Internal and miscellaneous errors

use thiserror::Error;

/// Main error type for maparchive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Database file not found at the specified path.
    #[error("Database not found: {path}")]
    DatabaseNotFound { path: String },

    /// The argument string could not be split into tokens.
    #[error("Cannot parse arguments: {reason}")]
    Parse { reason: String },

    /// Tokens were well formed but their combination is not allowed.
    #[error("{reason}")]
    Usage { reason: String },

    /// The filter matched nothing.
    #[error("No results")]
    NoResults,

    /// The requested page lies outside the available range.
    #[error("Invalid page {page}, select a page between 1 and {max_page}")]
    InvalidPage { page: i64, max_page: usize },

    /// An entry failed validation before being written.
    #[error("Invalid entry: {reason}")]
    InvalidEntry { reason: String },

    /// No entry exists with the given id.
    #[error("Entry not found: {id}")]
    EntryNotFound { id: i64 },

    /// Importing entries from a file failed.
    #[error("Import from {path} failed: {reason}")]
    ImportFailed { path: String, reason: String },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// SQLite error occurred.
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ArchiveError {
    pub(crate) fn usage(reason: impl Into<String>) -> Self {
        ArchiveError::Usage {
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(reason: impl Into<String>) -> Self {
        ArchiveError::Parse {
            reason: reason.into(),
        }
    }

    /// Returns the error code for this error.
    pub const fn error_code(&self) -> &'static str {
        match self {
            ArchiveError::DatabaseNotFound { .. } => "ARC-E001",
            ArchiveError::Parse { .. } => "ARC-E101",
            ArchiveError::Usage { .. } => "ARC-E102",
            ArchiveError::NoResults => "ARC-E201",
            ArchiveError::InvalidPage { .. } => "ARC-E202",
            ArchiveError::InvalidEntry { .. } => "ARC-E301",
            ArchiveError::EntryNotFound { .. } => "ARC-E302",
            ArchiveError::ImportFailed { .. } => "ARC-E303",
            ArchiveError::IoError(_) => "ARC-E901",
            ArchiveError::SqliteError(_) => "ARC-E902",
            ArchiveError::JsonError(_) => "ARC-E903",
        }
    }

    /// Returns the severity level for this error.
    ///
    /// An empty result set is an answer, not a fault.
    pub const fn severity(&self) -> &'static str {
        match self {
            ArchiveError::NoResults | ArchiveError::InvalidPage { .. } => "info",
            ArchiveError::Parse { .. } | ArchiveError::Usage { .. } => "warning",
            _ => "error",
        }
    }

    /// Returns remediation hints for this error, if available.
    pub const fn remediation(&self) -> Option<&'static str> {
        match self {
            ArchiveError::DatabaseNotFound { .. } => {
                Some("Pass --db or set MAPARCHIVE_DB, and run `maparchive init` for a new archive.")
            }
            ArchiveError::Parse { .. } => Some("Check that every opening quote has a closing quote."),
            ArchiveError::Usage { .. } => Some(
                "Keys: page, artist, type, palette, size, order. Sizes use >, >=, <, <= or = followed by a number.",
            ),
            ArchiveError::NoResults => Some("Remove a filter or lower the size bound."),
            ArchiveError::InvalidPage { .. } => None,
            ArchiveError::InvalidEntry { .. } => {
                Some("Entries need a width and height of at least 1, a name and one artist.")
            }
            ArchiveError::EntryNotFound { .. } => Some("Look the id up with `maparchive search`."),
            ArchiveError::ImportFailed { .. } => {
                Some("The import file must contain a JSON array of entries.")
            }
            ArchiveError::IoError(_) => Some("Check file permissions and disk space."),
            ArchiveError::SqliteError(_) => {
                Some("The database may be locked or corrupted. Try the command again.")
            }
            ArchiveError::JsonError(_) => None,
        }
    }

    /// True when the store reported a transient condition worth retrying.
    ///
    /// The archive itself never retries; callers decide on backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ArchiveError::SqliteError(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
