//! Fixed classifications attached to every archive entry.
//!
//! Two closed sets describe how a map-art was built:
//!
//! - [`Technique`] - the block placement technique (flat, staircased, ...)
//! - [`Palette`] - which colours the build draws from
//!
//! Users type these loosely ("Dual Layered", "semi", "fl"), so both sets share
//! a best-effort resolver. Resolution tries, in order:
//!
//! 1. exact case-insensitive match on the identifier (`DUALLAYERED`)
//! 2. case, space and hyphen insensitive match on label or identifier
//!    (`dual layered`, `Dual-Layered`)
//! 3. a unique case-insensitive prefix of a label (`fl` -> `flat`)
//!
//! Ambiguous or unknown input resolves to `None`; callers decide whether
//! that is fatal.

use crate::error::ArchiveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shared behaviour of the closed classification sets.
pub trait Classifier: Copy + Eq + 'static {
    /// Every enumerant, in display order.
    const ALL: &'static [Self];

    /// Canonical upper-case identifier, as stored in the database.
    fn identifier(self) -> &'static str;

    /// Human readable label.
    fn label(self) -> &'static str;

    /// Best-effort mapping of free text to an enumerant.
    fn resolve(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Some(found) = Self::ALL
            .iter()
            .find(|value| value.identifier().eq_ignore_ascii_case(input))
        {
            return Some(*found);
        }

        let squashed = squash(input);
        if let Some(found) = Self::ALL.iter().find(|value| {
            squash(value.label()) == squashed || squash(value.identifier()) == squashed
        }) {
            return Some(*found);
        }

        let lowered = input.to_lowercase();
        let mut prefixed = Self::ALL
            .iter()
            .filter(|value| value.label().starts_with(lowered.as_str()));
        match (prefixed.next(), prefixed.next()) {
            (Some(only), None) => Some(*only),
            _ => None,
        }
    }

    /// Every enumerant whose label equals `keyword`, ignoring case, spaces and hyphens.
    ///
    /// Used by keyword search, which matches labels exactly rather than by prefix.
    fn matching_label(keyword: &str) -> Vec<Self> {
        let squashed = squash(keyword);
        Self::ALL
            .iter()
            .copied()
            .filter(|value| squash(value.label()) == squashed)
            .collect()
    }

    /// Decode a stored identifier, falling back to the `Unknown` enumerant.
    fn from_identifier(identifier: &str) -> Self;
}

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// How the map-art was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Technique {
    Flat,
    #[serde(rename = "DUALLAYERED")]
    DualLayered,
    Staircased,
    #[serde(rename = "SEMISTAIRCASED")]
    SemiStaircased,
    #[default]
    Unknown,
}

impl Classifier for Technique {
    const ALL: &'static [Self] = &[
        Technique::Flat,
        Technique::DualLayered,
        Technique::Staircased,
        Technique::SemiStaircased,
        Technique::Unknown,
    ];

    fn identifier(self) -> &'static str {
        match self {
            Technique::Flat => "FLAT",
            Technique::DualLayered => "DUALLAYERED",
            Technique::Staircased => "STAIRCASED",
            Technique::SemiStaircased => "SEMISTAIRCASED",
            Technique::Unknown => "UNKNOWN",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Technique::Flat => "flat",
            Technique::DualLayered => "dual-layered",
            Technique::Staircased => "staircased",
            Technique::SemiStaircased => "semi-staircased",
            Technique::Unknown => "unknown",
        }
    }

    fn from_identifier(identifier: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|value| value.identifier() == identifier)
            .unwrap_or_else(|| {
                tracing::warn!(identifier, "unknown stored technique, using UNKNOWN");
                Technique::Unknown
            })
    }
}

/// Which colours the map-art uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Palette {
    #[serde(rename = "FULLCOLOUR")]
    FullColour,
    #[serde(rename = "TWOCOLOUR")]
    TwoColour,
    #[serde(rename = "CARPETONLY")]
    CarpetOnly,
    #[serde(rename = "GREYSCALE")]
    Greyscale,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Classifier for Palette {
    const ALL: &'static [Self] = &[
        Palette::FullColour,
        Palette::TwoColour,
        Palette::CarpetOnly,
        Palette::Greyscale,
        Palette::Unknown,
    ];

    fn identifier(self) -> &'static str {
        match self {
            Palette::FullColour => "FULLCOLOUR",
            Palette::TwoColour => "TWOCOLOUR",
            Palette::CarpetOnly => "CARPETONLY",
            Palette::Greyscale => "GREYSCALE",
            Palette::Unknown => "UNKNOWN",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Palette::FullColour => "full colour",
            Palette::TwoColour => "two-colour",
            Palette::CarpetOnly => "carpet only",
            Palette::Greyscale => "greyscale",
            Palette::Unknown => "unknown",
        }
    }

    fn from_identifier(identifier: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|value| value.identifier() == identifier)
            .unwrap_or_else(|| {
                tracing::warn!(identifier, "unknown stored palette, using UNKNOWN");
                Palette::Unknown
            })
    }
}

/// Resolve free text, or fail with a usage error listing the valid labels.
///
/// `what` names the set in the message ("map type", "palette").
pub(crate) fn resolve_or_usage<T: Classifier>(input: &str, what: &str) -> Result<T, ArchiveError> {
    T::resolve(input).ok_or_else(|| {
        let labels = T::ALL.iter().map(|value| value.label()).collect::<Vec<_>>();
        ArchiveError::usage(format!(
            "unknown {} `{}`, use one of: {}",
            what,
            input,
            labels.join(", ")
        ))
    })
}

/// Resolve free text to a [`Technique`].
pub fn resolve_technique(input: &str) -> Option<Technique> {
    Technique::resolve(input)
}

/// Resolve free text to a [`Palette`].
pub fn resolve_palette(input: &str) -> Option<Palette> {
    Palette::resolve(input)
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Technique {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve_technique(s).ok_or_else(|| format!("unknown map type '{}'", s))
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        resolve_palette(s).ok_or_else(|| format!("unknown palette '{}'", s))
    }
}
