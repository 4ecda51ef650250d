//! Tablesmith MSSQL - SQL Server Session
//!
//! Implements the `Session` contract over a TDS connection and loads the
//! connection settings it needs.

pub mod config;
pub mod session;

pub use config::{AuthConfig, ConfigError, ConnectionConfig, EncryptionMode};
pub use session::MssqlSession;
