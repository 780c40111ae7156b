//! Database abstraction layer for sqlreplay.
//!
//! Provides a trait-based interface for executing raw statement text, so the
//! replay engine can run against MySQL or an in-memory mock.

mod mock;
mod mysql;

pub use mock::MockDatabaseClient;
pub use mysql::MySqlClient;

use crate::config::ConnectionConfig;
use crate::error::{ReplayError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Creates a MySQL client with room for `workers` concurrent executors plus
/// the coordinator.
///
/// This is the central factory function for database connections.
pub async fn connect(
    config: &ConnectionConfig,
    workers: usize,
) -> Result<Arc<dyn DatabaseClient>> {
    let client = MySqlClient::connect(config, pool_size(workers)?).await?;
    Ok(Arc::new(client))
}

/// Connections needed for `workers` executors plus the coordinator.
fn pool_size(workers: usize) -> Result<u32> {
    u32::try_from(workers)
        .ok()
        .and_then(|n| n.checked_add(1))
        .ok_or_else(|| ReplayError::config(format!("worker count {workers} is too large")))
}

/// Trait defining the interface for statement execution handles.
///
/// Implementations must tolerate concurrent calls from every worker.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes raw SQL text, which may contain several `;`-separated statements.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
