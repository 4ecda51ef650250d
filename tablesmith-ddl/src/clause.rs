//! Column clauses and table definition text.

use tablesmith_core::{
    niladic_canonical, quote_ident, quote_unicode_literal, unquote_string_literal, ColumnSpec,
    DefaultValue, ExistingColumn, PrimaryKey, QualifiedName, TypeFamily,
};

const INDENT: &str = "    ";

/// `DEFAULT ...` for a new or changed column.
///
/// Expressions are emitted verbatim. Literals are emitted bare for numeric
/// and boolean families and as a unicode string literal otherwise. A literal
/// that already carries quotes is unquoted once first.
pub fn default_clause(default: &DefaultValue, family: TypeFamily) -> String {
    match default {
        DefaultValue::Expression(text) => format!("DEFAULT {}", text.trim()),
        DefaultValue::Literal(text) => {
            let bare = unquote_string_literal(text).unwrap_or_else(|| text.trim().to_string());
            if family.takes_bare_literal() {
                format!("DEFAULT {bare}")
            } else {
                format!("DEFAULT {}", quote_unicode_literal(&bare))
            }
        }
    }
}

/// Definition clause for a pending column, terminated with a separator.
pub fn column_clause(spec: &ColumnSpec) -> String {
    let mut clause = format!("{} {}", quote_ident(&spec.name), spec.column_type);
    if !spec.nullable {
        clause.push_str(" NOT NULL");
    }
    if let Some(default) = &spec.default {
        clause.push(' ');
        clause.push_str(&default_clause(default, spec.column_type.family()));
    }
    clause.push(',');
    clause
}

/// Strip the parentheses the server wraps stored defaults in, e.g.
/// `((0))` becomes `0` and `(getdate())` becomes `GETDATE()`.
pub fn unwrap_default_definition(stored: &str) -> String {
    let mut text = stored.trim();
    while is_wrapped(text) {
        text = text[1..text.len() - 1].trim();
    }
    match niladic_canonical(text) {
        Some(canonical) => canonical.to_string(),
        None => text.to_string(),
    }
}

/// Whether the first `(` of `text` closes at its final character.
fn is_wrapped(text: &str) -> bool {
    if !(text.starts_with('(') && text.ends_with(')')) {
        return false;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let last = text.len() - 1;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }
    false
}

/// One definition line for a column that already exists. Computed columns
/// keep their expression; named defaults keep their constraint name.
pub fn existing_column_line(column: &ExistingColumn) -> String {
    if let Some(computed) = &column.computed {
        let mut line = format!(
            "{} AS {}",
            quote_ident(&column.name),
            computed.definition.trim()
        );
        if computed.persisted {
            line.push_str(" PERSISTED");
            if !column.nullable {
                line.push_str(" NOT NULL");
            }
        }
        return line;
    }

    let mut line = format!("{} {}", quote_ident(&column.name), column.type_text);
    if let Some(identity) = &column.identity {
        line.push_str(&format!(" IDENTITY({},{})", identity.seed, identity.increment));
    }
    line.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if column.has_default() {
        if let Some(name) = &column.default_constraint {
            line.push_str(" CONSTRAINT ");
            line.push_str(&quote_ident(name));
        }
        line.push_str(" DEFAULT ");
        line.push_str(&column.default_definition);
    }
    line
}

pub fn primary_key_clause(pk: &PrimaryKey) -> String {
    let columns = pk
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.order.keyword()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CONSTRAINT {} PRIMARY KEY {} ({})",
        quote_ident(&pk.name),
        if pk.clustered { "CLUSTERED" } else { "NONCLUSTERED" },
        columns
    )
}

/// Full `CREATE TABLE` text, one column or constraint per line.
pub fn table_definition(
    name: &QualifiedName,
    columns: &[ExistingColumn],
    primary_key: Option<&PrimaryKey>,
) -> String {
    let mut lines: Vec<String> = columns.iter().map(existing_column_line).collect();
    if let Some(pk) = primary_key {
        lines.push(primary_key_clause(pk));
    }
    format!(
        "CREATE TABLE {} (\n{INDENT}{}\n)",
        name.quoted(),
        lines.join(&format!(",\n{INDENT}"))
    )
}
