//! Tablesmith Engine - Column Mutation Orchestrator
//!
//! Validates requests, opens the ambient transaction, and either drives the
//! table rebuild (column adds) or a short direct-alter sequence (rename,
//! retype, delete). Every path commits as a whole or rolls back.

mod direct;
pub mod log;
pub mod orchestrator;
pub mod rebuild;
mod txn;

pub use log::{LogEntry, LogLevel, LogSink, MemorySink, TracingSink};
pub use orchestrator::Orchestrator;
pub use rebuild::RebuildReport;
