//! Utility functions for query operations.

use sha2::{Digest, Sha256};

/// Create a LIKE substring pattern, escaping `%`, `_` and `\`.
///
/// Pair with `ESCAPE '\'` in the SQL.
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Case-folded lookup key for an artist name.
///
/// SQLite's `NOCASE` only folds ASCII, so names are compared on this key instead.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Stable short id for a filter, independent of the page requested.
///
/// Two invocations that differ only in their page number share an id, so
/// consumers can group pages of one listing.
pub fn query_id<'a, I>(non_page_tokens: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Sha256::new();
    for token in non_page_tokens {
        hasher.update(token.as_bytes());
        hasher.update(b"\0");
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
