//! Tablesmith Core - Column and Table Model
//!
//! Pure data structures shared by every Tablesmith crate: the immutable
//! description of a pending column operation, the read-only snapshot of an
//! existing table, the error taxonomy, identifier quoting, and the states
//! of the table rebuild. No I/O happens here.

pub mod column;
pub mod config;
pub mod error;
pub mod ident;
pub mod snapshot;
pub mod state;

pub use column::{
    validate_specs, Anchor, BaseType, BaseTypeParseError, ColumnChange, ColumnSpec, ColumnType,
    DefaultValue, TypeFamily, MAX_IDENTIFIER_LEN, NILADIC_DEFAULTS, niladic_canonical,
};
pub use config::{EngineConfig, DEFAULT_EXCLUDED_SCHEMAS};
pub use error::{
    ConnectionError, DdlExecutionError, ErrorKind, MetadataError, TablesmithError,
    TablesmithResult, ValidationError,
};
pub use ident::{quote_ident, quote_unicode_literal, unquote_string_literal, QualifiedName};
pub use snapshot::{
    CheckConstraint, Computed, ExistingColumn, ForeignKey, Identity, IndexDefinition, IndexKind,
    InboundForeignKey, KeyColumn, MutationPlan, Permission, PermissionGrant, PermissionState,
    PrimaryKey, ReferentialAction, SortOrder, TableSnapshot,
};
pub use state::RebuildState;
