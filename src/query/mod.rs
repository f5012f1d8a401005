//! Query module: the search argument language and its executor.
//!
//! A search runs through four stages:
//!
//! - [`parse_tokens`] splits the raw argument string into [`Token`]s
//! - [`build_filter`] interprets tokens into a validated [`FilterSpec`]
//! - [`build_entry_query`] turns the filter into parameterised SQL
//! - [`execute_query`] runs it against an [`EntryStore`](crate::EntryStore)
//!   and checks the result and page bounds
//!
//! [`search_archive`] chains all of them.

mod builder;
mod execute;
mod filter;
mod tokens;
mod util;

pub use builder::{build_entry_query, EntryQuery};
pub use execute::{execute_query, execute_query_paged, search_archive, QueryResult};
pub use filter::{build_filter, FilterSpec};
pub use tokens::{join_args, join_raw, normalize_permalinks, parse_tokens, Token};
pub use util::query_id;

pub(crate) use builder::ENTRY_COLUMNS;
pub(crate) use util::name_key;
