//! Tablesmith Catalog - Read-Only Catalog Introspection
//!
//! Every query here is static text with positional parameters; schema and
//! table names travel as values and are resolved server-side. DDL that
//! reproduces the captured objects is synthesized by tablesmith-ddl.

pub mod queries;
pub mod reader;
pub mod snapshot;

pub use reader::{find_default_constraint, list_columns, list_schemas, list_tables, table_exists};
pub use snapshot::{
    capture_checks, capture_inbound_foreign_keys, capture_indexes, capture_outbound_foreign_keys,
    capture_permissions, capture_primary_key, capture_table_snapshot, capture_table_structure,
    ensure_rebuild_supported,
};
