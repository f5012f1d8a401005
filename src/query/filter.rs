//! Filter builder: turns tokens into a fully resolved [`FilterSpec`].
//!
//! Unkeyed tokens are classified in a fixed order, so a leading `-` is read as
//! a page number or size before it is read as an exclusion:
//!
//! 1. page number (`-?\d{1,3}`)
//! 2. size qualifier (`>N`, `>=N`, `<N`, `<=N`, `=N`)
//! 3. reserved flag (`-f`, `-c`, `-dup`, ...)
//! 4. keyword (included, or excluded when prefixed with `-`)
//!
//! Keyed tokens resolve their key by unique prefix against
//! `page`, `artist`, `type`, `palette`, `size` and `order`.
//!
//! The default view hides small builds. Any explicit filter relaxes that
//! floor: keywords, artists, types and palettes drop it to 0, filtering out
//! flat builds drops it to 8. The floor only ever goes down.

use crate::classifier::{resolve_or_usage, Palette, Technique};
use crate::config::{ModeDefaults, FLAT_FILTER_MIN_SIZE};
use crate::error::ArchiveError;
use crate::query::tokens::Token;
use crate::OrderBy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

const FLAT_FLAGS: &[&str] = &["-f", "-flat"];
const CARPET_FLAGS: &[&str] = &["-c", "-co", "-carpet", "-carpetonly", "-carpet-only"];
const DUPLICATE_FLAG: &str = "-dup";

/// Structured, validated search filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub included_technique: BTreeSet<Technique>,
    pub excluded_technique: BTreeSet<Technique>,
    pub included_palette: BTreeSet<Palette>,
    pub excluded_palette: BTreeSet<Palette>,
    /// Artist names, matched case-insensitively and exactly
    pub included_contributor: Vec<String>,
    pub excluded_contributor: Vec<String>,
    /// Free-text terms matched against name, artists, labels and message id
    pub included_keyword: Vec<String>,
    pub excluded_keyword: Vec<String>,
    /// Inclusive bound on width x height
    pub min_size: Option<u64>,
    /// Inclusive bound on width x height
    pub max_size: Option<u64>,
    pub order_by: OrderBy,
    pub reverse: bool,
    /// Only entries whose message holds more than one entry
    pub filter_duplicates: bool,
    /// 1-based; out of range values are rejected by the executor
    pub page: i64,
    /// Source text of every non-page token, for re-issuing the query
    pub non_page_tokens: Vec<String>,
}

impl FilterSpec {
    /// True when the user narrowed the listing beyond the page number.
    pub fn is_filtered(&self) -> bool {
        !self.non_page_tokens.is_empty()
    }
}

/// Keys accepted in `key:value` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterKey {
    Page,
    Artist,
    Type,
    Palette,
    Size,
    Order,
}

const FILTER_KEYS: &[(&str, FilterKey)] = &[
    ("page", FilterKey::Page),
    ("artist", FilterKey::Artist),
    ("type", FilterKey::Type),
    ("palette", FilterKey::Palette),
    ("size", FilterKey::Size),
    ("order", FilterKey::Order),
];

fn resolve_key(key: &str) -> Result<FilterKey, ArchiveError> {
    let lowered = key.to_lowercase();
    let candidates: Vec<_> = FILTER_KEYS
        .iter()
        .filter(|(name, _)| name.starts_with(lowered.as_str()))
        .collect();
    match candidates.as_slice() {
        [(_, only)] => Ok(*only),
        [] => Err(ArchiveError::usage(format!("unknown key `{}`, aborting", key))),
        many => Err(ArchiveError::usage(format!(
            "ambiguous key `{}`, could be {}",
            key,
            many.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(" or ")
        ))),
    }
}

/// Which side of the size range a qualifier constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeBound {
    AtLeast(u64),
    AtMost(u64),
    Exactly(u64),
}

/// What an unkeyed token means.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Page(i64),
    Size(SizeBound),
    ExcludeFlat,
    ExcludeCarpet,
    Duplicates,
    Keyword { exclude: bool, text: String },
}

static PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{1,3}$").expect("static regex"));

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<qualifier>[<>]=?|=)(?P<size>\d+)$").expect("static regex")
});

const SIZE_HELP: &str = "Invalid size argument, use a qualifier (>, >=, <, <=, =) and a size";

/// Parse `>N`, `>=N`, `<N`, `<=N` or `=N` into an inclusive bound.
///
/// Returns `Ok(None)` when `value` is not a size expression at all.
fn parse_size(value: &str) -> Result<Option<SizeBound>, ArchiveError> {
    let Some(caps) = SIZE_RE.captures(value) else {
        return Ok(None);
    };
    let size: i64 = caps["size"]
        .parse()
        .map_err(|_| ArchiveError::usage(SIZE_HELP))?;
    let (size, bound): (i64, fn(u64) -> SizeBound) = match &caps["qualifier"] {
        ">" => (size.saturating_add(1), SizeBound::AtLeast),
        ">=" => (size, SizeBound::AtLeast),
        "<" => (size - 1, SizeBound::AtMost),
        "<=" => (size, SizeBound::AtMost),
        _ => (size, SizeBound::Exactly),
    };
    if size < 1 {
        return Err(ArchiveError::usage(SIZE_HELP));
    }
    Ok(Some(bound(size as u64)))
}

fn classify(token: &Token) -> Result<Term, ArchiveError> {
    if !token.quoted {
        let value = token.value.as_str();
        if PAGE_RE.is_match(value) {
            let page = value
                .parse()
                .map_err(|_| ArchiveError::usage(format!("invalid page `{}`", value)))?;
            return Ok(Term::Page(page));
        }
        if let Some(bound) = parse_size(value)? {
            return Ok(Term::Size(bound));
        }
        if FLAT_FLAGS.contains(&value) {
            return Ok(Term::ExcludeFlat);
        }
        if CARPET_FLAGS.contains(&value) {
            return Ok(Term::ExcludeCarpet);
        }
        if value == DUPLICATE_FLAG {
            return Ok(Term::Duplicates);
        }
    }

    let text = token.plain_value();
    if text.trim().is_empty() {
        return Err(ArchiveError::usage(format!(
            "empty search term `{}`",
            token.raw
        )));
    }
    Ok(Term::Keyword {
        exclude: token.exclude,
        text: text.to_string(),
    })
}

/// Accumulates a [`FilterSpec`] while tokens are consumed.
struct FilterState {
    spec: FilterSpec,
    page: Option<i64>,
    order: Option<(OrderBy, bool)>,
    effective_min_size: u64,
}

impl FilterState {
    fn new(defaults: ModeDefaults) -> Self {
        Self {
            spec: FilterSpec {
                included_technique: BTreeSet::new(),
                excluded_technique: BTreeSet::new(),
                included_palette: BTreeSet::new(),
                excluded_palette: BTreeSet::new(),
                included_contributor: Vec::new(),
                excluded_contributor: Vec::new(),
                included_keyword: Vec::new(),
                excluded_keyword: Vec::new(),
                min_size: None,
                max_size: None,
                order_by: defaults.order_by,
                reverse: false,
                filter_duplicates: false,
                page: 1,
                non_page_tokens: Vec::new(),
            },
            page: None,
            order: None,
            effective_min_size: u64::from(defaults.min_size),
        }
    }

    fn lower_default_min_size(&mut self, floor: u64) {
        self.effective_min_size = self.effective_min_size.min(floor);
    }

    fn set_page(&mut self, page: i64) -> Result<(), ArchiveError> {
        if self.page.is_some() {
            return Err(ArchiveError::usage("multiple page arguments encountered"));
        }
        self.page = Some(page);
        Ok(())
    }

    fn apply_size(&mut self, bound: SizeBound) -> Result<(), ArchiveError> {
        let (min, max) = match bound {
            SizeBound::AtLeast(size) => (Some(size), None),
            SizeBound::AtMost(size) => (None, Some(size)),
            SizeBound::Exactly(size) => (Some(size), Some(size)),
        };
        if let Some(min) = min {
            if self.spec.min_size.is_some() {
                return Err(ArchiveError::usage("multiple min-size arguments encountered"));
            }
            self.spec.min_size = Some(min);
        }
        if let Some(max) = max {
            if self.spec.max_size.is_some() {
                return Err(ArchiveError::usage("multiple max-size arguments encountered"));
            }
            self.spec.max_size = Some(max);
        }
        Ok(())
    }

    fn apply_unkeyed(&mut self, token: &Token) -> Result<(), ArchiveError> {
        let term = classify(token)?;
        tracing::trace!(raw = %token.raw, ?term, "classified token");

        match term {
            Term::Page(page) => return self.set_page(page),
            Term::Size(bound) => self.apply_size(bound)?,
            Term::ExcludeFlat => {
                // dual-layered builds stay; `-type:dual-layered` drops them
                self.spec.excluded_technique.insert(Technique::Flat);
                self.lower_default_min_size(u64::from(FLAT_FILTER_MIN_SIZE));
            }
            Term::ExcludeCarpet => {
                self.spec.excluded_palette.insert(Palette::CarpetOnly);
            }
            Term::Duplicates => self.spec.filter_duplicates = true,
            Term::Keyword { exclude, text } => {
                self.lower_default_min_size(0);
                if exclude {
                    self.spec.excluded_keyword.push(text);
                } else {
                    self.spec.included_keyword.push(text);
                }
            }
        }
        self.spec.non_page_tokens.push(token.raw.clone());
        Ok(())
    }

    fn apply_keyed(&mut self, key: &str, token: &Token) -> Result<(), ArchiveError> {
        let value = token.value.as_str();
        match resolve_key(key)? {
            FilterKey::Page => {
                if token.exclude {
                    return Err(ArchiveError::usage("cannot use exclusion for argument `page`"));
                }
                let page = value
                    .parse()
                    .map_err(|_| ArchiveError::usage(format!("invalid page `{}`", value)))?;
                // page tokens are not carried into non_page_tokens
                return self.set_page(page);
            }
            FilterKey::Artist => {
                self.lower_default_min_size(0);
                if token.exclude {
                    self.spec.excluded_contributor.push(value.to_string());
                } else {
                    self.spec.included_contributor.push(value.to_string());
                }
            }
            FilterKey::Type => {
                let technique: Technique = resolve_or_usage(value, "map type")?;
                self.lower_default_min_size(0);
                if token.exclude {
                    self.spec.excluded_technique.insert(technique);
                } else {
                    self.spec.included_technique.insert(technique);
                }
            }
            FilterKey::Palette => {
                let palette: Palette = resolve_or_usage(value, "palette")?;
                self.lower_default_min_size(0);
                if token.exclude {
                    self.spec.excluded_palette.insert(palette);
                } else {
                    self.spec.included_palette.insert(palette);
                }
            }
            FilterKey::Size => {
                if token.exclude {
                    return Err(ArchiveError::usage("cannot use exclusion for argument `size`"));
                }
                let bound = parse_size(value)?.ok_or_else(|| ArchiveError::usage(SIZE_HELP))?;
                self.apply_size(bound)?;
            }
            FilterKey::Order => {
                if self.order.is_some() {
                    return Err(ArchiveError::usage("multiple order arguments encountered"));
                }
                let mut reverse = token.exclude;
                let mut order = value;
                if let Some(rest) = order.strip_prefix('-') {
                    reverse = !reverse;
                    order = rest;
                }
                let order_by = OrderBy::from_arg(order).ok_or_else(|| {
                    ArchiveError::usage(format!(
                        "invalid order argument: '{}', use 'size' or 'date'",
                        order
                    ))
                })?;
                self.order = Some((order_by, reverse));
            }
        }
        self.spec.non_page_tokens.push(token.raw.clone());
        Ok(())
    }

    fn finish(mut self) -> FilterSpec {
        self.spec.page = self.page.unwrap_or(1);
        if self.spec.min_size.is_none() {
            self.spec.min_size = Some(self.effective_min_size);
        }
        if let Some((order_by, reverse)) = self.order {
            self.spec.order_by = order_by;
            self.spec.reverse = reverse;
        }
        self.spec
    }
}

/// Interpret tokens as a filter, applying the mode's defaults.
///
/// Fails at the first invalid token; no partial filter is returned.
pub fn build_filter(tokens: &[Token], defaults: ModeDefaults) -> Result<FilterSpec, ArchiveError> {
    let mut state = FilterState::new(defaults);
    for token in tokens {
        match token.key.as_deref() {
            Some(key) => state.apply_keyed(key, token)?,
            None => state.apply_unkeyed(token)?,
        }
    }
    let spec = state.finish();
    tracing::debug!(?spec, "built filter");
    Ok(spec)
}
