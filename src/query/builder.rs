//! SQL query builder for archive searches.
//!
//! Turns a [`FilterSpec`] into one parameterised `SELECT` over `map_art`.
//! Every predicate is a bound parameter; only placeholders and fixed column
//! names are spliced into the SQL text.

use crate::classifier::{Classifier, Palette, Technique};
use crate::query::filter::FilterSpec;
use crate::query::util::{like_pattern, name_key};
use crate::OrderBy;
use rusqlite::types::Value;

/// Columns read for every entry, in the order the store decodes them.
pub(crate) const ENTRY_COLUMNS: &str = "m.id, m.width, m.height, m.technique, m.palette, m.name, \
     m.notes, m.message_id, m.author_id, m.create_date, m.image_url, m.flagged";

const HAS_CONTRIBUTOR: &str = "EXISTS (
        SELECT 1 FROM artist_map_art am
        JOIN artist a ON a.id = am.artist_id
        WHERE am.map_id = m.id AND a.name_key = ?
    )";

/// A store-ready description of a search: SQL text plus bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

fn identifiers<T: Classifier>(values: impl IntoIterator<Item = T>) -> Vec<Value> {
    values
        .into_iter()
        .map(|value| Value::Text(value.identifier().to_string()))
        .collect()
}

/// Membership test against a set of stored enum identifiers.
fn push_membership(
    where_clauses: &mut Vec<String>,
    params: &mut Vec<Value>,
    column: &str,
    negate: bool,
    values: Vec<Value>,
) {
    if values.is_empty() {
        return;
    }
    where_clauses.push(format!(
        "{} {}IN ({})",
        column,
        if negate { "NOT " } else { "" },
        placeholders(values.len())
    ));
    params.extend(values);
}

/// Disjunction of every field a free-text keyword may match.
fn keyword_clause(keyword: &str, params: &mut Vec<Value>) -> String {
    let like = like_pattern(keyword);
    let mut alternatives = vec![
        "m.name LIKE ? ESCAPE '\\'".to_string(),
        "m.notes LIKE ? ESCAPE '\\'".to_string(),
        HAS_CONTRIBUTOR.to_string(),
    ];
    params.push(Value::Text(like.clone()));
    params.push(Value::Text(like));
    params.push(Value::Text(name_key(keyword)));

    let techniques = Technique::matching_label(keyword);
    if !techniques.is_empty() {
        alternatives.push(format!("m.technique IN ({})", placeholders(techniques.len())));
        params.extend(identifiers(techniques));
    }
    let palettes = Palette::matching_label(keyword);
    if !palettes.is_empty() {
        alternatives.push(format!("m.palette IN ({})", placeholders(palettes.len())));
        params.extend(identifiers(palettes));
    }
    if let Ok(message_id) = keyword.trim().parse::<i64>() {
        alternatives.push("m.message_id = ?".to_string());
        params.push(Value::Integer(message_id));
    }

    format!("({})", alternatives.join(" OR "))
}

fn order_clause(order_by: OrderBy, reverse: bool) -> String {
    let (asc, desc) = if reverse { ("DESC", "ASC") } else { ("ASC", "DESC") };
    match order_by {
        OrderBy::Size => format!(
            "m.width * m.height {desc}, m.create_date {asc}, m.id {asc}",
            desc = desc,
            asc = asc
        ),
        OrderBy::Date => format!("m.create_date {asc}, m.id {asc}", asc = asc),
    }
}

/// Build the full, ordered query for a filter.
///
/// Pagination is left to the executor: the whole match list is needed to
/// decide whether the requested page exists.
pub fn build_entry_query(spec: &FilterSpec) -> EntryQuery {
    let mut params: Vec<Value> = Vec::new();
    let mut where_clauses: Vec<String> = Vec::new();

    push_membership(
        &mut where_clauses,
        &mut params,
        "m.technique",
        false,
        identifiers(spec.included_technique.iter().copied()),
    );
    push_membership(
        &mut where_clauses,
        &mut params,
        "m.technique",
        true,
        identifiers(spec.excluded_technique.iter().copied()),
    );
    push_membership(
        &mut where_clauses,
        &mut params,
        "m.palette",
        false,
        identifiers(spec.included_palette.iter().copied()),
    );
    push_membership(
        &mut where_clauses,
        &mut params,
        "m.palette",
        true,
        identifiers(spec.excluded_palette.iter().copied()),
    );

    // every named artist must be present
    for name in &spec.included_contributor {
        where_clauses.push(HAS_CONTRIBUTOR.to_string());
        params.push(Value::Text(name_key(name)));
    }
    for name in &spec.excluded_contributor {
        where_clauses.push(format!("NOT {}", HAS_CONTRIBUTOR));
        params.push(Value::Text(name_key(name)));
    }

    for keyword in &spec.included_keyword {
        let clause = keyword_clause(keyword, &mut params);
        where_clauses.push(clause);
    }
    for keyword in &spec.excluded_keyword {
        let clause = keyword_clause(keyword, &mut params);
        where_clauses.push(format!("NOT {}", clause));
    }

    if let Some(min) = spec.min_size.filter(|min| *min > 0) {
        where_clauses.push("m.width * m.height >= ?".to_string());
        params.push(Value::Integer(clamp_to_i64(min)));
    }
    if let Some(max) = spec.max_size {
        where_clauses.push("m.width * m.height <= ?".to_string());
        params.push(Value::Integer(clamp_to_i64(max)));
    }

    if spec.filter_duplicates {
        // counted over the whole archive, not the filtered rows
        where_clauses.push(
            "m.message_id IN (SELECT message_id FROM map_art GROUP BY message_id HAVING COUNT(*) >= 2)"
                .to_string(),
        );
    }

    let sql = format!(
        "SELECT {columns}
FROM map_art m
WHERE {where_clause}
ORDER BY {order_by}",
        columns = ENTRY_COLUMNS,
        where_clause = if where_clauses.is_empty() {
            "1=1".to_string()
        } else {
            where_clauses.join("\n  AND ")
        },
        order_by = order_clause(spec.order_by, spec.reverse),
    );

    tracing::debug!(sql = %sql, params = params.len(), "built entry query");
    EntryQuery { sql, params }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
