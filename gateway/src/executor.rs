//! Statement execution against the relational store.
//!
//! Every invocation acquires its own connection, caps the server-side
//! execution time, runs exactly one statement and fetches every row. The
//! connection goes back to the pool when the guard drops, on success and on
//! every failure path.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::mysql::{MySqlDatabaseError, MySqlPool};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::models::{QueryOutcome, SqlQueryRequest};
use crate::rows::{decode_row, Row};

/// MySQL `ER_QUERY_TIMEOUT`: statement interrupted by `max_execution_time`.
pub const MYSQL_QUERY_TIMEOUT: u16 = 3024;

/// A positional bind value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Date(NaiveDate),
    Text(String),
}

/// SQL text plus its positional (`?`) bind values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

impl Statement {
    /// A statement with no bind values.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }
}

/// Why a statement produced no rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    /// The server interrupted the statement at the execution cap.
    Timeout,
    /// Connection, pool, TLS or protocol trouble.
    Operational(String),
    /// The server rejected the statement.
    Database(String),
    /// Anything else, including rows that could not be decoded.
    Execution(String),
}

impl ExecutionFailure {
    /// Classify a driver error.
    pub fn classify(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let number = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(MySqlDatabaseError::number);
                Self::from_server_error(number, db_err.to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Operational(err.to_string()),
            other => Self::Execution(other.to_string()),
        }
    }

    /// Classify a server-reported error by its MySQL error number.
    pub fn from_server_error(number: Option<u16>, message: impl Into<String>) -> Self {
        match number {
            Some(MYSQL_QUERY_TIMEOUT) => Self::Timeout,
            _ => Self::Database(message.into()),
        }
    }

    /// User-facing message for this failure.
    pub fn describe(&self, timeout_secs: u64) -> String {
        match self {
            Self::Timeout => format!(
                "Query execution timeout after {} seconds. Try narrowing your date range or filters.",
                timeout_secs
            ),
            Self::Operational(msg) => format!("Database operational error: {}", msg.trim()),
            Self::Database(msg) => format!("Database error: {}", msg.trim()),
            Self::Execution(msg) => format!("Execution error: {}", msg.trim()),
        }
    }
}

impl From<sqlx::Error> for ExecutionFailure {
    fn from(err: sqlx::Error) -> Self {
        Self::classify(&err)
    }
}

/// Runs one statement and returns every row.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn fetch_rows(
        &self,
        statement: &Statement,
        timeout_secs: u64,
    ) -> Result<Vec<Row>, ExecutionFailure>;
}

/// [`QueryRunner`] backed by a MySQL pool.
pub struct MySqlRunner {
    pool: MySqlPool,
}

impl MySqlRunner {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryRunner for MySqlRunner {
    async fn fetch_rows(
        &self,
        statement: &Statement,
        timeout_secs: u64,
    ) -> Result<Vec<Row>, ExecutionFailure> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(&format!(
            "SET SESSION max_execution_time = {}",
            timeout_secs.saturating_mul(1000)
        ))
        .execute(&mut *conn)
        .await?;

        let mut query = sqlx::query(&statement.sql).persistent(false);
        for bind in &statement.binds {
            query = match bind {
                BindValue::Date(date) => query.bind(*date),
                BindValue::Text(text) => query.bind(text.as_str()),
            };
        }

        let rows = query.fetch_all(&mut *conn).await?;
        debug!("Fetched {} raw rows", rows.len());

        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ExecutionFailure::from)
    }
}

/// Execute a free-form query that already passed the read-only gate.
///
/// `org_id` is only checked for presence in the query text; a miss is logged,
/// not enforced.
pub async fn execute_query(runner: &dyn QueryRunner, request: &SqlQueryRequest) -> QueryOutcome {
    if !request.query.to_lowercase().contains("org_id") {
        warn!(
            "Query does not include org_id filter. Org: {}",
            request.org_id
        );
    }

    let started = Instant::now();
    let result = runner
        .fetch_rows(&Statement::raw(request.query.as_str()), request.timeout_secs)
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(rows) => {
            info!("Query returned {} rows in {}ms", rows.len(), elapsed_ms);
            QueryOutcome::success(rows, elapsed_ms)
        }
        Err(failure) => {
            error!("Query execution failed: {:?}", failure);
            QueryOutcome::failure(&failure, request.timeout_secs)
        }
    }
}
