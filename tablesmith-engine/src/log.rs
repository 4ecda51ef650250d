//! Leveled log sink injected into the orchestrator.
//!
//! The engine reports each rebuild state, every error, and every rollback
//! attempt through a [`LogSink`]. The sink cannot influence control flow.

use std::fmt;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives `(level, message)` pairs from the engine.
pub trait LogSink: Send + Sync {
    fn append(&self, level: LogLevel, message: &str);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn append(&self, level: LogLevel, message: &str) {
        (**self).append(level, message)
    }
}

impl<T: LogSink + ?Sized> LogSink for &T {
    fn append(&self, level: LogLevel, message: &str) {
        (**self).append(level, message)
    }
}

// ============================================================================
// TRACING SINK
// ============================================================================

/// Forwards entries to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "tablesmith::sink", "{message}"),
            LogLevel::Info => tracing::info!(target: "tablesmith::sink", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "tablesmith::sink", "{message}"),
            LogLevel::Error => tracing::error!(target: "tablesmith::sink", "{message}"),
        }
    }
}

// ============================================================================
// MEMORY SINK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Collects entries in memory, for tests and presentation adapters that
/// render the log themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: RwLock<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Messages logged at exactly `level`, in order.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl LogSink for MemorySink {
    fn append(&self, level: LogLevel, message: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(LogEntry {
                level,
                message: message.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.append(LogLevel::Info, "TempCopy");
        sink.append(LogLevel::Error, "boom");
        sink.append(LogLevel::Info, "Aborted");

        assert_eq!(sink.entries().len(), 3);
        assert_eq!(sink.messages_at(LogLevel::Info), vec!["TempCopy", "Aborted"]);
        assert_eq!(sink.messages_at(LogLevel::Error), vec!["boom"]);

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_forwarding_impls() {
        let sink = Arc::new(MemorySink::new());
        let shared: Arc<MemorySink> = Arc::clone(&sink);
        shared.append(LogLevel::Warn, "via arc");
        (&*sink).append(LogLevel::Debug, "via ref");
        TracingSink.append(LogLevel::Info, "to tracing");

        assert_eq!(sink.messages_at(LogLevel::Warn), vec!["via arc"]);
        assert_eq!(sink.messages_at(LogLevel::Debug), vec!["via ref"]);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
