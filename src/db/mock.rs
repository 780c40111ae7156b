//! Mock database client for testing and dry runs.
//!
//! Records every submitted statement instead of executing it.

use super::DatabaseClient;
use crate::error::{ReplayError, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A mock database client that records submitted SQL.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    executed: Mutex<Vec<String>>,
    delay: Option<Duration>,
    fail_on: Option<String>,
}

impl MockDatabaseClient {
    /// Creates a new mock client that accepts every statement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` inside every call, to simulate a slow server.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fails every call whose SQL text contains `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    /// Returns every SQL text submitted so far, in call order.
    ///
    /// Failed calls are included.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.executed.lock().map(|log| log.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute(&self, sql: &str) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.executed
            .lock()
            .map_err(|_| ReplayError::internal("mock execution log poisoned"))?
            .push(sql.to_string());

        match &self.fail_on {
            Some(needle) if sql.contains(needle.as_str()) => Err(ReplayError::execution(format!(
                "mock failure: statement contains '{needle}'"
            ))),
            _ => Ok(()),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
