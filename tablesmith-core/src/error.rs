//! Error types for Tablesmith operations

use thiserror::Error;

/// Input errors, raised before any database interaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate column in request: {name}")]
    DuplicateColumn { name: String },

    #[error("No schema and table targeted")]
    NoTableTargeted,
}

/// Session availability errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("No database session attached")]
    NoSession,

    #[error("Database session is closed")]
    SessionClosed,

    #[error("Connection to {target} failed: {reason}")]
    ConnectFailed { target: String, reason: String },
}

/// Catalog introspection errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Catalog query '{query}' failed: {reason}")]
    QueryFailed { query: String, reason: String },

    #[error("Table not found: [{schema}].[{table}]")]
    TableNotFound { schema: String, table: String },

    #[error("Unexpected catalog value in {column}: {reason}")]
    UnexpectedValue { column: String, reason: String },

    #[error("Table definition is malformed: {reason}")]
    MalformedDefinition { reason: String },

    #[error("Cannot rebuild [{schema}].[{table}]: {object} is not supported")]
    UnsupportedObject {
        schema: String,
        table: String,
        object: String,
    },
}

/// Errors raised by statements executed inside the mutation transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DdlExecutionError {
    #[error("Statement failed: {reason} [{statement}]")]
    StatementFailed { statement: String, reason: String },

    #[error("Could not begin transaction: {reason}")]
    BeginFailed { reason: String },

    #[error("Commit failed: {reason}")]
    CommitFailed { reason: String },
}

/// Stable classification of a [`TablesmithError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Connection,
    Metadata,
    DdlExecution,
    RollbackFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Connection => "connection",
            ErrorKind::Metadata => "metadata",
            ErrorKind::DdlExecution => "ddl_execution",
            ErrorKind::RollbackFailed => "rollback_failed",
        }
    }
}

/// Master error type for all Tablesmith errors.
#[derive(Debug, Clone, Error)]
pub enum TablesmithError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("DDL execution error: {0}")]
    DdlExecution(#[from] DdlExecutionError),

    /// The transaction could not be rolled back after `cause`. The table may
    /// be left in an intermediate state and needs manual inspection.
    #[error("Rollback failed ({reason}) after: {cause}")]
    RollbackFailed {
        cause: Box<TablesmithError>,
        reason: String,
    },
}

impl TablesmithError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TablesmithError::Validation(_) => ErrorKind::Validation,
            TablesmithError::Connection(_) => ErrorKind::Connection,
            TablesmithError::Metadata(_) => ErrorKind::Metadata,
            TablesmithError::DdlExecution(_) => ErrorKind::DdlExecution,
            TablesmithError::RollbackFailed { .. } => ErrorKind::RollbackFailed,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, TablesmithError::Validation(_))
    }

    /// DDL mutation is not idempotent; nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for Tablesmith operations.
pub type TablesmithResult<T> = Result<T, TablesmithError>;

// =============================================================================
// TESTS
// =============================================================================
