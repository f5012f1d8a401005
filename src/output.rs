use crate::config::ArchiveConfig;
use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::query::{query_id, FilterSpec, QueryResult};
use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Pretty,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Pretty => "pretty",
        };
        write!(f, "{}", value)
    }
}

#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub schema_version: &'static str,
    pub execution_id: String,
    pub tool: &'static str,
    pub timestamp: String,
    pub data: T,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
    pub message: String,
    pub remediation: Option<String>,
    pub retryable: bool,
}

impl From<&ArchiveError> for ErrorResponse {
    fn from(err: &ArchiveError) -> Self {
        Self {
            code: err.error_code().to_string(),
            error: err.severity().to_string(),
            message: err.to_string(),
            remediation: err.remediation().map(|s| s.to_string()),
            retryable: err.is_retryable(),
        }
    }
}

/// An entry with its derived fields, as emitted in JSON.
#[derive(Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub total_units: u64,
    pub link: String,
}

impl EntryView {
    pub fn new(entry: &Entry, config: &ArchiveConfig) -> Self {
        Self {
            total_units: entry.total_units(),
            link: entry.permalink(config),
            entry: entry.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct SearchResponse {
    /// Shared by every page of the same filter
    pub query_id: String,
    pub results: Vec<EntryView>,
    pub page: i64,
    pub max_page: usize,
    /// Rank of the first entry in `results`
    pub first_rank: usize,
    pub total_count: usize,
    pub filters: FilterSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<String>,
}

impl SearchResponse {
    pub fn new(result: &QueryResult, filters: FilterSpec, config: &ArchiveConfig) -> Self {
        Self {
            query_id: query_id(result.non_page_tokens.iter().map(String::as_str)),
            results: result
                .page_entries()
                .iter()
                .map(|entry| EntryView::new(entry, config))
                .collect(),
            page: result.page,
            max_page: result.max_page(),
            first_rank: result.first_rank(),
            total_count: result.results.len(),
            filters,
            next_page: result.next_page_command(),
            previous_page: result.previous_page_command(),
        }
    }
}

pub fn json_response<T>(data: T) -> JsonResponse<T> {
    JsonResponse {
        schema_version: SCHEMA_VERSION,
        execution_id: execution_id(),
        tool: "maparchive",
        timestamp: Utc::now().to_rfc3339(),
        data,
    }
}

pub fn execution_id() -> String {
    let timestamp = Utc::now().timestamp();
    let pid = std::process::id();
    format!("{:x}-{:x}", timestamp, pid)
}

/// Render a payload inside the JSON envelope.
pub fn render_json<T: Serialize>(data: T, format: OutputFormat) -> Result<String, ArchiveError> {
    let payload = json_response(data);
    let rendered = if matches!(format, OutputFormat::Pretty) {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }?;
    Ok(rendered)
}

/// Check if format is JSON (either Json or Pretty)
pub fn is_json_format(format: OutputFormat) -> bool {
    matches!(format, OutputFormat::Json | OutputFormat::Pretty)
}

/// Human listing of one result page.
///
/// `command` is what the user typed to get here; it prefixes the page hint.
/// With `ranked`, lines are numbered across pages.
pub fn format_entry_list(
    result: &QueryResult,
    title: &str,
    command: &str,
    ranked: bool,
    config: &ArchiveConfig,
) -> String {
    let mut lines = vec![format!("# {}:", title)];
    let first_rank = result.first_rank();
    for (i, entry) in result.page_entries().iter().enumerate() {
        if ranked {
            lines.push(format!("{}. {}", first_rank + i, entry.line(config)));
        } else {
            lines.push(entry.line(config));
        }
    }
    lines.push(String::new());

    let mut footer = format!("Page {}/{}", result.page, result.max_page());
    if let Some(next) = result.next_page_command() {
        footer.push_str(&format!(" - use `{} {}` to see next page", command, next));
    } else if let Some(previous) = result.previous_page_command() {
        footer.push_str(&format!(" - use `{} {}` to see previous page", command, previous));
    }
    lines.push(footer);
    lines.join("\n")
}

/// Human detail block for a single entry.
pub fn format_entry_detail(entry: &Entry, config: &ArchiveConfig) -> String {
    let total = entry.total_units();
    let mut out = vec![
        format!("# {}", entry.name),
        format!("[Jump to message in archive]({})", entry.permalink(config)),
    ];
    if let Some(id) = entry.id {
        out.push(format!("id: {}", id));
    }
    if entry.provenance.flagged {
        out.push("(image flagged as sensitive)".to_string());
    }
    out.push(String::new());
    out.push("### Size".to_string());
    out.push(format!(
        "{} x {} ({} {})",
        entry.width,
        entry.height,
        total,
        if total == 1 { "map" } else { "maps" }
    ));
    out.push("### Artists".to_string());
    out.extend(entry.contributors.iter().map(|artist| format!("* {}", artist)));
    out.push("### Type".to_string());
    out.push(entry.technique.to_string());
    out.push("### Palette".to_string());
    out.push(entry.palette.to_string());
    out.push("### Notes".to_string());
    if entry.notes.trim().is_empty() {
        out.push("-".to_string());
    } else {
        out.extend(entry.notes.lines().map(|line| format!("> {}", line)));
    }
    out.join("\n")
}
