//! Merging pending columns into a captured table definition.
//!
//! The definition body is split into items at top-level commas: each item
//! is either a column definition or a table constraint. Pending clauses are
//! inserted among the column items according to their anchor, and constraint
//! items are always emitted last in their original order. The merged text
//! holds one item per line.

use crate::clause::column_clause;
use tablesmith_core::{Anchor, ColumnSpec, MetadataError};

/// First keywords that mark a line as a table constraint rather than a
/// column.
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN", "INDEX", "PERIOD",
];

/// Merge `specs`, in order, into `definition`.
///
/// `AtStart` inserts before the first column line; `After(x)` inserts right
/// after the first line whose column is `x` (case-insensitive); `AtEnd` or an
/// anchor naming a column that is not present appends after the last column
/// line. Each insertion is visible to the specs that follow it.
pub fn merge_columns_into_table_text(
    definition: &str,
    specs: &[ColumnSpec],
) -> Result<String, MetadataError> {
    let (open, close) = body_bounds(definition)?;
    let head = definition[..open].trim_end();
    let tail = definition[close + 1..].trim();

    let mut columns: Vec<String> = Vec::new();
    let mut constraints: Vec<String> = Vec::new();
    for item in split_items(&definition[open + 1..close]) {
        if is_constraint_line(item) {
            constraints.push(item.to_string());
        } else {
            columns.push(item.to_string());
        }
    }

    for spec in specs {
        let clause = column_clause(spec).trim_end_matches(',').to_string();
        let position = match &spec.anchor {
            Anchor::AtStart => 0,
            Anchor::After(anchor) => columns
                .iter()
                .position(|line| {
                    leading_identifier(line).is_some_and(|name| name.eq_ignore_ascii_case(anchor))
                })
                .map_or(columns.len(), |i| i + 1),
            Anchor::AtEnd => columns.len(),
        };
        columns.insert(position, clause);
    }

    let body = columns
        .into_iter()
        .chain(constraints)
        .collect::<Vec<_>>()
        .join(",\n    ");

    let mut merged = format!("{head} (\n    {body}\n)");
    if !tail.is_empty() {
        merged.push(' ');
        merged.push_str(tail);
    }
    Ok(merged)
}

/// Byte offsets of the body's opening and closing parentheses: the first `(`
/// outside bracket-quoted names and string literals, and the last `)`.
fn body_bounds(definition: &str) -> Result<(usize, usize), MetadataError> {
    let mut in_brackets = false;
    let mut in_string = false;
    let mut open = None;
    for (i, c) in definition.char_indices() {
        match c {
            '[' if !in_string => in_brackets = true,
            ']' if !in_string => in_brackets = false,
            '\'' if !in_brackets => in_string = !in_string,
            '(' if !in_brackets && !in_string => {
                open = Some(i);
                break;
            }
            _ => {}
        }
    }
    let open = open.ok_or_else(|| MetadataError::MalformedDefinition {
        reason: "no opening parenthesis".to_string(),
    })?;
    let close = definition
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(|| MetadataError::MalformedDefinition {
            reason: "no closing parenthesis".to_string(),
        })?;
    Ok((open, close))
}

/// Split a definition body at commas that sit outside string literals,
/// quoted identifiers and parentheses. Items come back trimmed; empty ones
/// are dropped.
fn split_items(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_brackets = false;
    let mut in_quotes = false;
    let mut start = 0;
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' if !in_brackets && !in_quotes => in_string = !in_string,
            _ if in_string => {}
            ']' if in_brackets => {
                if chars.peek().map(|(_, next)| *next) == Some(']') {
                    chars.next();
                } else {
                    in_brackets = false;
                }
            }
            _ if in_brackets => {}
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '[' => in_brackets = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(body[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

/// Whether a body line is a table constraint.
pub fn is_constraint_line(line: &str) -> bool {
    let first = line
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    CONSTRAINT_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(first))
}

/// The column name a definition line starts with, unquoted.
pub fn leading_identifier(line: &str) -> Option<String> {
    let line = line.trim_start();
    if let Some(rest) = line.strip_prefix('[') {
        let mut name = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == ']' {
                if chars.peek() == Some(&']') {
                    chars.next();
                } else {
                    return Some(name);
                }
            }
            name.push(c);
        }
        None
    } else {
        line.split_whitespace()
            .next()
            .map(|word| word.trim_end_matches(',').to_string())
            .filter(|word| !word.is_empty())
    }
}
