//! Tablesmith DDL - Pure DDL Synthesis
//!
//! Text transformations that build column clauses, merge pending columns
//! into a captured `CREATE TABLE` text, and render every statement the
//! engine executes. Nothing here touches a database.

pub mod clause;
pub mod merge;
pub mod statements;
pub mod types;

pub use clause::{
    column_clause, default_clause, existing_column_line, primary_key_clause, table_definition,
    unwrap_default_definition,
};
pub use merge::{is_constraint_line, leading_identifier, merge_columns_into_table_text};
pub use types::type_text;
