//! Tokenizer for the search argument language.
//!
//! A raw argument string is split into [`Token`]s. At each position (after
//! leading whitespace) the first matching form wins:
//!
//! 1. `key:"quoted value"` (`\"` and `\\` are unescaped)
//! 2. `key:value`
//! 3. `"quoted value"` or `-"quoted value"`
//! 4. a bare run of non-whitespace characters (quotes excluded)
//!
//! A `-` in front of a key marks the token as an exclusion. For bare values the
//! leading `-` is kept in [`Token::value`] because `-5` may be a page number and
//! `-f` a reserved flag; the filter builder decides what it means.
//!
//! Message permalinks are rewritten to their trailing message id before
//! tokenizing, so users can paste a link where an id is expected.

use crate::error::ArchiveError;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::sync::LazyLock;

/// One argument of a search command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Token was prefixed with `-`
    pub exclude: bool,
    /// Key of a `key:value` token, without the exclusion prefix
    pub key: Option<String>,
    /// Value with quotes and escapes removed
    pub value: String,
    /// The exact source text of the token, used to re-issue the query
    pub raw: String,
    /// Value was written inside double quotes
    pub quoted: bool,
}

impl Token {
    /// Value with an exclusion `-` stripped from bare tokens.
    pub fn plain_value(&self) -> &str {
        if self.exclude && !self.quoted && self.key.is_none() {
            self.value.strip_prefix('-').unwrap_or(&self.value)
        } else {
            &self.value
        }
    }
}

static KEYED_QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<key>[^\s:"]+)\s*:\s*"(?P<value>(?:[^"\\]|\\.)*)""#).expect("static regex")
});

static KEYED_PLAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<key>[^\s:"]+)\s*:\s*(?P<value>[^\s"]+)"#).expect("static regex")
});

static POSITIONAL_QUOTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<exclude>-?)"(?P<value>(?:[^"\\]|\\.)*)""#).expect("static regex")
});

static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?P<value>[^\s"]+)"#).expect("static regex"));

static PERMALINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:(?:ptb|canary)\.)?discord(?:app)?\.com/channels/(?:\d+|@me)/\d+/(?P<message>\d+)",
    )
    .expect("static regex")
});

static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\(.)").expect("static regex"));

/// Replace message permalinks with their bare message id.
pub fn normalize_permalinks(raw: &str) -> String {
    let normalized = PERMALINK_RE.replace_all(raw, "$message");
    if normalized != raw {
        tracing::debug!(raw, normalized = %normalized, "rewrote message permalink");
    }
    normalized.into_owned()
}

fn unescape(value: &str) -> String {
    ESCAPE_RE.replace_all(value, "$1").into_owned()
}

fn split_exclusion(key: &str) -> (bool, String) {
    match key.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, key.to_string()),
    }
}

/// Split a raw argument string into tokens.
///
/// Fails only on malformed quoting, e.g. a quote that is never closed.
pub fn parse_tokens(raw: &str) -> Result<Vec<Token>, ArchiveError> {
    let normalized = normalize_permalinks(raw);
    let mut rest = normalized.trim_start();
    let mut tokens = Vec::new();

    while !rest.is_empty() {
        let (token, consumed) = if let Some(caps) = KEYED_QUOTED_RE.captures(rest) {
            let (exclude, key) = split_exclusion(&caps["key"]);
            let whole = &caps[0];
            (
                Token {
                    exclude,
                    key: Some(key),
                    value: unescape(&caps["value"]),
                    raw: whole.to_string(),
                    quoted: true,
                },
                whole.len(),
            )
        } else if let Some(caps) = KEYED_PLAIN_RE.captures(rest) {
            let (exclude, key) = split_exclusion(&caps["key"]);
            let whole = &caps[0];
            (
                Token {
                    exclude,
                    key: Some(key),
                    value: caps["value"].to_string(),
                    raw: whole.to_string(),
                    quoted: false,
                },
                whole.len(),
            )
        } else if let Some(caps) = POSITIONAL_QUOTED_RE.captures(rest) {
            let whole = &caps[0];
            (
                Token {
                    exclude: !caps["exclude"].is_empty(),
                    key: None,
                    value: unescape(&caps["value"]),
                    raw: whole.to_string(),
                    quoted: true,
                },
                whole.len(),
            )
        } else if let Some(caps) = BARE_RE.captures(rest) {
            let value = &caps["value"];
            (
                Token {
                    exclude: value.starts_with('-'),
                    key: None,
                    value: value.to_string(),
                    raw: value.to_string(),
                    quoted: false,
                },
                value.len(),
            )
        } else {
            let fragment: String = rest.chars().take(32).collect();
            return Err(ArchiveError::parse(format!(
                "unterminated quote at `{}`",
                fragment
            )));
        };

        tracing::trace!(?token, "token");
        tokens.push(token);
        rest = rest[consumed..].trim_start();
    }

    Ok(tokens)
}

/// Rebuild an argument string from arguments already split by a shell.
///
/// The shell removes quotes, so an argument holding whitespace is quoted again:
/// `artist:Jane Doe` becomes `artist:"Jane Doe"` and `-old town` becomes
/// `-"old town"`. Arguments that still contain a `"` are passed through as typed.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| requote(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn requote(arg: &str) -> Cow<'_, str> {
    if !arg.chars().any(char::is_whitespace) || arg.contains('"') {
        return Cow::Borrowed(arg);
    }
    if let Some((key, value)) = arg.split_once(':') {
        if !key.is_empty() && !key.chars().any(char::is_whitespace) {
            return Cow::Owned(format!("{}:\"{}\"", key, escape_quoted(value.trim_start())));
        }
    }
    match arg.strip_prefix('-') {
        Some(rest) => Cow::Owned(format!("-\"{}\"", escape_quoted(rest))),
        None => Cow::Owned(format!("\"{}\"", escape_quoted(arg))),
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Join token source texts back into an argument string.
pub fn join_raw<'a, I>(raws: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    raws.into_iter().collect::<Vec<_>>().join(" ")
}
