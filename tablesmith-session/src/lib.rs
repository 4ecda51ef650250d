//! Tablesmith Session - Database Session Contract and Mock Implementation
//!
//! Defines the transactional session the engine runs on. The SQL Server
//! implementation lives in tablesmith-mssql; [`MockSession`] is a scripted
//! in-memory stand-in for tests.

pub mod mock;
pub mod value;

pub use mock::{MockSession, SessionEvent};
pub use value::{FromValue, Row, RowSet, Value};

use ::async_trait::async_trait;
use tablesmith_core::{ConnectionError, DdlExecutionError, MetadataError, TablesmithError};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Driver-level session errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,

    #[error("Driver error: {message}")]
    Driver { message: String },

    #[error("Column not present in row: {column}")]
    MissingColumn { column: String },

    #[error("Cannot decode column {column}: {reason}")]
    Decode { column: String, reason: String },
}

impl SessionError {
    pub fn driver(message: impl Into<String>) -> Self {
        SessionError::Driver {
            message: message.into(),
        }
    }

    /// Attribute the failure to a catalog query.
    pub fn into_metadata_error(self, query: &str) -> TablesmithError {
        match self {
            SessionError::Closed => ConnectionError::SessionClosed.into(),
            SessionError::MissingColumn { column } => MetadataError::UnexpectedValue {
                column,
                reason: "missing from result".to_string(),
            }
            .into(),
            SessionError::Decode { column, reason } => {
                MetadataError::UnexpectedValue { column, reason }.into()
            }
            SessionError::Driver { message } => MetadataError::QueryFailed {
                query: query.to_string(),
                reason: message,
            }
            .into(),
        }
    }

    /// Attribute the failure to a statement run inside the mutation
    /// transaction.
    pub fn into_ddl_error(self, statement: &str) -> TablesmithError {
        match self {
            SessionError::Closed => ConnectionError::SessionClosed.into(),
            other => DdlExecutionError::StatementFailed {
                statement: statement.to_string(),
                reason: other.to_string(),
            }
            .into(),
        }
    }
}

// ============================================================================
// SESSION TRAIT
// ============================================================================

/// An open, transactional database session.
///
/// Statements run strictly one after another. Parameters are positional and
/// bind to `@P1`, `@P2`, ... in statement text.
#[async_trait]
pub trait Session: Send {
    /// Open the ambient transaction.
    async fn begin(&mut self) -> Result<(), SessionError>;

    async fn commit(&mut self) -> Result<(), SessionError>;

    /// Roll back the ambient transaction. Must not fail merely because the
    /// server has already aborted it.
    async fn rollback(&mut self) -> Result<(), SessionError>;

    /// Run a statement that returns no rows; yields the affected row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, SessionError>;

    /// Run a query and fetch its first result set.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, SessionError>;

    fn is_open(&self) -> bool;

    async fn close(&mut self) -> Result<(), SessionError>;
}
