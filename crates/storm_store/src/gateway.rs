//! Connection-per-operation access to the database with bounded retry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{StoreError, StoreResult};
use crate::schema::SCHEMA;

/// Connection and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("storm.db"),
            busy_timeout_ms: 3000,
            max_attempts: 3,
            base_backoff_ms: 1000,
        }
    }
}

impl StoreConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, base_backoff_ms: u64) -> Self {
        self.base_backoff_ms = base_backoff_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Backoff slept after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }
}

/// Runs operations against a freshly opened connection each time.
///
/// No connection is kept between calls. Each attempt opens the database,
/// applies the busy timeout, makes sure the schema exists, runs the
/// operation inside a transaction and drops the connection on every exit
/// path. A failed attempt is retried after an exponential backoff; when the
/// last attempt fails its error is returned unchanged.
#[derive(Debug, Clone)]
pub struct SessionGateway {
    config: Arc<StoreConfig>,
}

impl SessionGateway {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn database_path(&self) -> &Path {
        &self.config.database_path
    }

    fn open(config: &StoreConfig) -> StoreResult<Connection> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.database_path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn attempt<T, F>(config: &StoreConfig, operation: &F) -> StoreResult<T>
    where
        F: Fn(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = Self::open(config)?;
        // Take the write lock up front so two read-modify-write operations
        // cannot deadlock on lock upgrade.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = operation(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `operation` in its own connection and transaction, retrying the
    /// whole open-run-close cycle on any error.
    pub async fn run_with_session<T, F>(&self, operation: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: Fn(&Transaction<'_>) -> StoreResult<T> + Send + Sync + 'static,
    {
        let operation = Arc::new(operation);
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let config = Arc::clone(&self.config);
            let op = Arc::clone(&operation);

            let result = tokio::task::spawn_blocking(move || Self::attempt(&config, op.as_ref()))
                .await
                .unwrap_or_else(|e| Err(StoreError::Task(e.to_string())));

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Database operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database operation failed"
                    );
                    tokio::time::sleep(delay).await;

                    if attempt >= max_attempts {
                        error!(attempts = attempt, error = %e, "Database operation failed permanently");
                        return Err(e);
                    }
                }
            }
        }
    }
}
