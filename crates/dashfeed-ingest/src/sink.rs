// SQL sinks: where rendered statements are executed
//
// `PgSink` runs them against Postgres through sqlx. `RecordingSink` keeps them
// in memory; `--dry-run` prints what it recorded and the tests assert on it.

use crate::config::DatabaseConfig;
use crate::error::{IngestError, WriteError};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// What a statement does, so sinks can account for it without parsing SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Delete { table: String },
    Insert { table: String, rows: usize },
    UpdateTracking,
    PostCommit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
}

impl Statement {
    pub fn is_insert(&self) -> bool {
        matches!(self.kind, StatementKind::Insert { .. })
    }
}

/// An open transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait SqlTransaction: Send {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, WriteError>;

    async fn commit(self: Box<Self>) -> Result<(), WriteError>;
}

#[async_trait]
pub trait SqlSink: Send {
    async fn begin(&mut self) -> Result<Box<dyn SqlTransaction>, WriteError>;

    /// Run a statement on its own, outside any transaction
    async fn execute(&mut self, statement: &Statement) -> Result<u64, WriteError>;
}

// ============================================================================
// Postgres
// ============================================================================

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, IngestError> {
        let url = config.connection_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&url)
            .await
            .map_err(WriteError::from_sqlx)?;

        info!(
            host = %config.host,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self::new(pool))
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SqlTransaction for PgTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, WriteError> {
        let conn: &mut sqlx::PgConnection = &mut self.tx;
        let result = sqlx::Executor::execute(conn, sqlx::raw_sql(&statement.sql))
            .await
            .map_err(WriteError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), WriteError> {
        self.tx.commit().await.map_err(WriteError::from_sqlx)
    }
}

#[async_trait]
impl SqlSink for PgSink {
    async fn begin(&mut self) -> Result<Box<dyn SqlTransaction>, WriteError> {
        let tx = self.pool.begin().await.map_err(WriteError::from_sqlx)?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64, WriteError> {
        let result = sqlx::raw_sql(&statement.sql)
            .execute(&self.pool)
            .await
            .map_err(WriteError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// In-memory recording
// ============================================================================

#[derive(Debug, Default)]
struct RecordingState {
    committed: Vec<Vec<Statement>>,
    standalone: Vec<Statement>,
    rolled_back: usize,
    tables: HashMap<String, usize>,
    executed: usize,
    fail_at: Option<usize>,
}

/// Keeps every statement in memory and tracks row counts per table
///
/// Clones share state, so a test can hand one clone to the pipeline and
/// inspect another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    state: Arc<Mutex<RecordingState>>,
}

fn lock(state: &Mutex<RecordingState>) -> MutexGuard<'_, RecordingState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th statement executed inside a transaction (0-based, counted
    /// across all transactions)
    pub fn failing_at(index: usize) -> Self {
        let sink = Self::default();
        lock(&sink.state).fail_at = Some(index);
        sink
    }

    /// Pretend `table` already holds `rows` rows
    pub fn seed_table(&self, table: &str, rows: usize) {
        lock(&self.state).tables.insert(table.to_string(), rows);
    }

    /// Committed transactions, oldest first
    pub fn committed(&self) -> Vec<Vec<Statement>> {
        lock(&self.state).committed.clone()
    }

    /// Statements run outside a transaction
    pub fn standalone(&self) -> Vec<Statement> {
        lock(&self.state).standalone.clone()
    }

    pub fn rolled_back(&self) -> usize {
        lock(&self.state).rolled_back
    }

    /// Rows currently "in" a table
    pub fn row_count(&self, table: &str) -> usize {
        lock(&self.state).tables.get(table).copied().unwrap_or(0)
    }

    /// Every committed and standalone statement, in execution order
    pub fn statements(&self) -> Vec<Statement> {
        let state = lock(&self.state);
        state
            .committed
            .iter()
            .flatten()
            .chain(state.standalone.iter())
            .cloned()
            .collect()
    }
}

struct RecordingTransaction {
    state: Arc<Mutex<RecordingState>>,
    pending: Vec<Statement>,
    committed: bool,
}

#[async_trait]
impl SqlTransaction for RecordingTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, WriteError> {
        let mut state = lock(&self.state);
        let index = state.executed;
        state.executed += 1;

        if state.fail_at == Some(index) {
            return Err(WriteError::ConstraintViolation(format!(
                "injected failure at statement {}",
                index
            )));
        }

        self.pending.push(statement.clone());
        Ok(match &statement.kind {
            StatementKind::Insert { rows, .. } => *rows as u64,
            _ => 0,
        })
    }

    async fn commit(mut self: Box<Self>) -> Result<(), WriteError> {
        let pending = std::mem::take(&mut self.pending);
        let mut state = lock(&self.state);
        for statement in &pending {
            match &statement.kind {
                StatementKind::Delete { table } => {
                    state.tables.insert(table.clone(), 0);
                },
                StatementKind::Insert { table, rows } => {
                    *state.tables.entry(table.clone()).or_insert(0) += rows;
                },
                _ => {},
            }
        }
        debug!(statements = pending.len(), "Recorded transaction committed");
        state.committed.push(pending);
        self.committed = true;
        Ok(())
    }
}

impl Drop for RecordingTransaction {
    fn drop(&mut self) {
        if !self.committed {
            lock(&self.state).rolled_back += 1;
        }
    }
}

#[async_trait]
impl SqlSink for RecordingSink {
    async fn begin(&mut self) -> Result<Box<dyn SqlTransaction>, WriteError> {
        Ok(Box::new(RecordingTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            committed: false,
        }))
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64, WriteError> {
        lock(&self.state).standalone.push(statement.clone());
        Ok(0)
    }
}
