//! The backend session abstraction the SQL connector executes through.
//!
//! [`SqlSession`] models one dedicated connection: statements, prepared
//! statements, and transaction control. [`SqlSessionFactory`] hands out
//! sessions — one per logical operation, never shared concurrently.
//!
//! [`ScriptedSessionFactory`] is an in-memory implementation for testing
//! and development: it records every statement in order and replays
//! scripted results, so transactional batching, failure handling, and
//! cancellation are testable without a live database.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sluice_core::{Row, Value};

use crate::error::{ConnectorError, Result};

/// One dedicated backend connection.
///
/// Transaction control is explicit: the connector brackets DML batches
/// with [`SqlSession::begin`] / [`SqlSession::commit`] and rolls back on
/// the first failing statement.
#[async_trait]
pub trait SqlSession: Send {
    /// Executes a statement, returning the affected row count.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Runs a query, returning all rows.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn begin(&mut self) -> Result<()>;

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn rollback(&mut self) -> Result<()>;

    /// Prepares a statement for repeated execution, returning a handle.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn prepare(&mut self, sql: &str) -> Result<u64>;

    /// Executes a prepared statement with fresh parameter bindings.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    async fn execute_prepared(&mut self, statement: u64, params: &[Value]) -> Result<u64>;
}

/// Hands out dedicated sessions, one per logical operation.
#[async_trait]
pub trait SqlSessionFactory: Send + Sync {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConnectionFailed`] when the backend is
    /// unreachable.
    async fn session(&self) -> Result<Box<dyn SqlSession>>;
}

/// A scripted reply for [`ScriptedSessionFactory`] queries.
#[derive(Debug, Clone)]
pub enum ScriptReply {
    /// Rows returned by the next `query` call.
    Rows(Vec<Row>),
    /// Affected-row count returned by the next matching `execute` call.
    Affected(u64),
}

#[derive(Debug, Default)]
struct ScriptState {
    query_replies: VecDeque<ScriptReply>,
    fail_on: Option<String>,
    calls: Vec<(String, Vec<Value>)>,
    prepared: HashMap<u64, String>,
    next_statement: u64,
}

/// In-memory [`SqlSessionFactory`] for testing and development.
///
/// Records every statement (including BEGIN/COMMIT/ROLLBACK) in call
/// order, replays queued rows for queries, and can be told to fail any
/// statement whose text contains a marker substring.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSessionFactory {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSessionFactory {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues rows for the next `query` call.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state
            .lock()
            .query_replies
            .push_back(ScriptReply::Rows(rows));
    }

    /// Makes any statement containing `marker` fail.
    pub fn fail_matching(&self, marker: impl Into<String>) {
        self.state.lock().fail_on = Some(marker.into());
    }

    /// Every statement executed so far, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Every call with its bound parameters, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl SqlSessionFactory for ScriptedSessionFactory {
    async fn session(&self) -> Result<Box<dyn SqlSession>> {
        Ok(Box::new(ScriptedSession {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Session handed out by [`ScriptedSessionFactory`]; all sessions share
/// the factory's script and call log.
#[derive(Debug)]
pub struct ScriptedSession {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSession {
    fn record(&self, sql: &str, params: &[Value]) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push((sql.to_string(), params.to_vec()));
        if let Some(marker) = &state.fail_on {
            if sql.contains(marker.as_str()) {
                return Err(ConnectorError::Write(format!(
                    "scripted failure for statement containing '{marker}'"
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SqlSession for ScriptedSession {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params)?;
        Ok(1)
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql, params)?;
        let reply = self.state.lock().query_replies.pop_front();
        match reply {
            Some(ScriptReply::Rows(rows)) => Ok(rows),
            Some(ScriptReply::Affected(_)) | None => Ok(Vec::new()),
        }
    }

    async fn begin(&mut self) -> Result<()> {
        self.record("BEGIN", &[])?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.record("COMMIT", &[])?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.record("ROLLBACK", &[])?;
        Ok(())
    }

    async fn prepare(&mut self, sql: &str) -> Result<u64> {
        let mut state = self.state.lock();
        state.next_statement += 1;
        let id = state.next_statement;
        state.prepared.insert(id, sql.to_string());
        state.calls.push((format!("PREPARE {sql}"), Vec::new()));
        Ok(id)
    }

    async fn execute_prepared(&mut self, statement: u64, params: &[Value]) -> Result<u64> {
        let sql = self
            .state
            .lock()
            .prepared
            .get(&statement)
            .cloned()
            .ok_or_else(|| ConnectorError::Write(format!("unknown statement {statement}")))?;
        self.record(&sql, params)?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_session_records_calls() {
        let factory = ScriptedSessionFactory::new();
        let mut session = factory.session().await.unwrap();
        session.begin().await.unwrap();
        session
            .execute("INSERT INTO t VALUES ($1)", &[Value::Int32(1)])
            .await
            .unwrap();
        session.commit().await.unwrap();
        assert_eq!(
            factory.statements(),
            vec!["BEGIN", "INSERT INTO t VALUES ($1)", "COMMIT"]
        );
        assert_eq!(factory.calls()[1].1, vec![Value::Int32(1)]);
    }

    #[tokio::test]
    async fn test_scripted_query_replay() {
        let factory = ScriptedSessionFactory::new();
        factory.push_rows(vec![vec![Value::Int32(7)]]);
        let mut session = factory.session().await.unwrap();
        let rows = session.query("SELECT x FROM t", &[]).await.unwrap();
        assert_eq!(rows, vec![vec![Value::Int32(7)]]);
        // A second query has no scripted reply and returns nothing.
        let rows = session.query("SELECT x FROM t", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_failure_marker() {
        let factory = ScriptedSessionFactory::new();
        factory.fail_matching("boom");
        let mut session = factory.session().await.unwrap();
        assert!(session.execute("UPDATE boom SET x = 1", &[]).await.is_err());
        assert!(session.execute("UPDATE ok SET x = 1", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_prepared_statements_rebind() {
        let factory = ScriptedSessionFactory::new();
        let mut session = factory.session().await.unwrap();
        let id = session.prepare("INSERT INTO t VALUES ($1)").await.unwrap();
        session
            .execute_prepared(id, &[Value::Int32(1)])
            .await
            .unwrap();
        session
            .execute_prepared(id, &[Value::Int32(2)])
            .await
            .unwrap();
        let calls = factory.calls();
        // One PREPARE, two executions re-binding the same text.
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0, calls[2].0);
        assert_ne!(calls[1].1, calls[2].1);
    }
}
