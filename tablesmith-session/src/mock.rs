//! Scripted in-memory session for testing.
//!
//! [`MockSession`] records every call, answers queries from canned result
//! sets keyed by exact statement text, and fails on demand. Clones share
//! state, so a test can keep a handle while the engine owns the session.

use crate::{RowSet, Session, SessionError, Value};
use ::async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One recorded session call.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Begin,
    Commit,
    Rollback,
    Execute { sql: String, params: Vec<Value> },
    Query { sql: String, params: Vec<Value> },
    Close,
}

#[derive(Debug)]
struct MockState {
    open: bool,
    in_transaction: bool,
    events: Vec<SessionEvent>,
    responses: HashMap<String, VecDeque<RowSet>>,
    failures: Vec<(String, String)>,
    fail_begin: Option<String>,
    fail_commit: Option<String>,
    fail_rollback: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            open: true,
            in_transaction: false,
            events: Vec::new(),
            responses: HashMap::new(),
            failures: Vec::new(),
            fail_begin: None,
            fail_commit: None,
            fail_rollback: None,
        }
    }
}

/// In-memory mock session for testing.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Arc<RwLock<MockState>>,
}

impl MockSession {
    /// Create an open mock session.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ========================================================================
    // SCRIPTING
    // ========================================================================

    /// Queue a result set for queries whose text equals `sql`. Queued sets
    /// are served in order; the last one keeps being served once the rest
    /// are used up. Unscripted queries return an empty set.
    pub fn respond(&self, sql: &str, rows: RowSet) -> &Self {
        self.write()
            .responses
            .entry(sql.to_string())
            .or_default()
            .push_back(rows);
        self
    }

    /// Fail any execute or query whose text contains `needle`.
    pub fn fail_on(&self, needle: &str, message: &str) -> &Self {
        self.write()
            .failures
            .push((needle.to_string(), message.to_string()));
        self
    }

    pub fn fail_begin(&self, message: &str) -> &Self {
        self.write().fail_begin = Some(message.to_string());
        self
    }

    pub fn fail_commit(&self, message: &str) -> &Self {
        self.write().fail_commit = Some(message.to_string());
        self
    }

    pub fn fail_rollback(&self, message: &str) -> &Self {
        self.write().fail_rollback = Some(message.to_string());
        self
    }

    /// Mark the session closed without recording a `Close` event.
    pub fn set_open(&self, open: bool) {
        self.write().open = open;
    }

    /// Forget recorded events; scripting is kept.
    pub fn clear_events(&self) {
        self.write().events.clear();
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    pub fn events(&self) -> Vec<SessionEvent> {
        self.read().events.clone()
    }

    /// Text of every executed (non-query) statement, in order.
    pub fn executed(&self) -> Vec<String> {
        self.read()
            .events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Execute { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Executed statements together with their parameters.
    pub fn executed_with_params(&self) -> Vec<(String, Vec<Value>)> {
        self.read()
            .events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Execute { sql, params } => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn queries(&self) -> Vec<String> {
        self.read()
            .events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Query { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Begin, commit and rollback events, in order.
    pub fn transaction_events(&self) -> Vec<SessionEvent> {
        self.read()
            .events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    SessionEvent::Begin | SessionEvent::Commit | SessionEvent::Rollback
                )
            })
            .cloned()
            .collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.read().in_transaction
    }

    fn check_failure(state: &MockState, sql: &str) -> Result<(), SessionError> {
        match state.failures.iter().find(|(needle, _)| sql.contains(needle)) {
            Some((_, message)) => Err(SessionError::driver(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn begin(&mut self) -> Result<(), SessionError> {
        let mut state = self.write();
        if !state.open {
            return Err(SessionError::Closed);
        }
        state.events.push(SessionEvent::Begin);
        if let Some(message) = state.fail_begin.clone() {
            return Err(SessionError::driver(message));
        }
        state.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        let mut state = self.write();
        if !state.open {
            return Err(SessionError::Closed);
        }
        state.events.push(SessionEvent::Commit);
        if let Some(message) = state.fail_commit.clone() {
            return Err(SessionError::driver(message));
        }
        state.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        let mut state = self.write();
        if !state.open {
            return Err(SessionError::Closed);
        }
        state.events.push(SessionEvent::Rollback);
        if let Some(message) = state.fail_rollback.clone() {
            return Err(SessionError::driver(message));
        }
        state.in_transaction = false;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, SessionError> {
        let mut state = self.write();
        if !state.open {
            return Err(SessionError::Closed);
        }
        state.events.push(SessionEvent::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Self::check_failure(&state, sql)?;
        Ok(0)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<RowSet, SessionError> {
        let mut state = self.write();
        if !state.open {
            return Err(SessionError::Closed);
        }
        state.events.push(SessionEvent::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Self::check_failure(&state, sql)?;
        let rows = match state.responses.get_mut(sql) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => RowSet::default(),
        };
        Ok(rows)
    }

    fn is_open(&self) -> bool {
        self.read().open
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let mut state = self.write();
        state.events.push(SessionEvent::Close);
        state.open = false;
        state.in_transaction = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let mut session = MockSession::new();
        let handle = session.clone();

        session.begin().await.unwrap();
        session
            .execute("DROP TABLE [dbo].[Orders]", &[])
            .await
            .unwrap();
        session.query("SELECT 1", &[Value::from("dbo")]).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(handle.executed(), vec!["DROP TABLE [dbo].[Orders]".to_string()]);
        assert_eq!(handle.queries(), vec!["SELECT 1".to_string()]);
        assert_eq!(
            handle.transaction_events(),
            vec![SessionEvent::Begin, SessionEvent::Commit]
        );
        assert!(!handle.in_transaction());
    }

    #[tokio::test]
    async fn test_queued_responses_last_one_sticks() {
        let mut session = MockSession::new();
        session
            .respond("Q", RowSet::new(&["n"]).with_row(vec![Value::Int(1)]))
            .respond("Q", RowSet::new(&["n"]).with_row(vec![Value::Int(2)]));

        let first = session.query("Q", &[]).await.unwrap();
        let second = session.query("Q", &[]).await.unwrap();
        let third = session.query("Q", &[]).await.unwrap();
        assert_eq!(first.rows()[0].get::<i64>("n").unwrap(), 1);
        assert_eq!(second.rows()[0].get::<i64>("n").unwrap(), 2);
        assert_eq!(third.rows()[0].get::<i64>("n").unwrap(), 2);

        assert!(session.query("unscripted", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mut session = MockSession::new();
        session.fail_on("CREATE TABLE", "syntax error").fail_rollback("link down");

        session.begin().await.unwrap();
        let err = session.execute("CREATE TABLE [x] (a int)", &[]).await;
        assert_eq!(err, Err(SessionError::driver("syntax error")));
        assert!(session.rollback().await.is_err());
        assert!(session.in_transaction());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let mut session = MockSession::new();
        session.close().await.unwrap();
        assert!(!session.is_open());
        assert_eq!(session.begin().await, Err(SessionError::Closed));
        assert_eq!(
            session.execute("SELECT 1", &[]).await,
            Err(SessionError::Closed)
        );
    }
}
