//! Identifier and literal quoting.
//!
//! Every identifier that reaches emitted DDL goes through [`quote_ident`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bracket-quote an identifier, doubling any closing bracket.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Render text as a unicode string literal, doubling single quotes.
pub fn quote_unicode_literal(text: &str) -> String {
    format!("N'{}'", text.replace('\'', "''"))
}

/// If `text` is a single quoted string literal (`'x'` or `N'x'`), return its
/// contents with doubled quotes collapsed. Returns `None` for anything else,
/// including text where a lone quote would end the literal early.
pub fn unquote_string_literal(text: &str) -> Option<String> {
    let text = text.trim();
    let body = text
        .strip_prefix("N'")
        .or_else(|| text.strip_prefix("n'"))
        .or_else(|| text.strip_prefix('\''))?
        .strip_suffix('\'')?;

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
            } else {
                return None;
            }
        }
        out.push(c);
    }
    Some(out)
}

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub table: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `[schema].[table]`
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// `[schema].[table].[column]`
    pub fn quoted_column(&self, column: &str) -> String {
        format!("{}.{}", self.quoted(), quote_ident(column))
    }

    /// Same schema, different table name.
    pub fn with_table(&self, table: impl Into<String>) -> Self {
        Self {
            schema: self.schema.clone(),
            table: table.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.quoted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_bracket() {
        assert_eq!(quote_ident("Orders"), "[Orders]");
        assert_eq!(quote_ident("a]b"), "[a]]b]");
        assert_eq!(quote_ident("x]; DROP TABLE t; --"), "[x]]; DROP TABLE t; --]");
    }

    #[test]
    fn test_quote_unicode_literal() {
        assert_eq!(quote_unicode_literal("USD"), "N'USD'");
        assert_eq!(quote_unicode_literal("O'Brien"), "N'O''Brien'");
        assert_eq!(quote_unicode_literal(""), "N''");
    }

    #[test]
    fn test_unquote_string_literal() {
        assert_eq!(unquote_string_literal("'USD'"), Some("USD".to_string()));
        assert_eq!(unquote_string_literal("N'USD'"), Some("USD".to_string()));
        assert_eq!(unquote_string_literal("'O''Brien'"), Some("O'Brien".to_string()));
        assert_eq!(unquote_string_literal("USD"), None);
        assert_eq!(unquote_string_literal("'a' + 'b'"), None);
        assert_eq!(unquote_string_literal("'"), None);
    }

    #[test]
    fn test_qualified_name() {
        let name = QualifiedName::new("dbo", "Orders");
        assert_eq!(name.quoted(), "[dbo].[Orders]");
        assert_eq!(name.to_string(), "[dbo].[Orders]");
        assert_eq!(name.quoted_column("Amount"), "[dbo].[Orders].[Amount]");
        assert_eq!(name.with_table("Orders_TEMP").quoted(), "[dbo].[Orders_TEMP]");
    }
}
