//! Dispatch coordinator.
//!
//! Routes each classified statement in document order: suppressed statements
//! are dropped, inserts go to the work queue, and everything else executes
//! right here before the next statement is looked at.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pool::WorkQueue;
use super::progress::ProgressSink;
use super::with_preamble;
use crate::db::DatabaseClient;
use crate::dump::{create_target, Classifier, DispatchClass, RawStatement};
use crate::error::Result;

/// Ordering between serial statements and previously queued inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingPolicy {
    /// Serial statements run as soon as they are read, possibly before
    /// earlier inserts have executed.
    #[default]
    Relaxed,
    /// Serial statements wait until every earlier insert has executed.
    Barrier,
}

impl std::str::FromStr for OrderingPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relaxed" => Ok(Self::Relaxed),
            "barrier" => Ok(Self::Barrier),
            _ => Err(format!(
                "Invalid ordering policy: {s}. Expected: relaxed or barrier"
            )),
        }
    }
}

/// Counts kept by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub statements: u64,
    pub locks_suppressed: u64,
    pub unlock_markers: u64,
    pub enqueued: u64,
    pub serial_succeeded: u64,
    pub serial_failed: u64,
    pub tables: u64,
}

pub struct Coordinator {
    classifier: Classifier,
    queue: WorkQueue,
    client: Arc<dyn DatabaseClient>,
    progress: Arc<dyn ProgressSink>,
    preamble: Arc<str>,
    ordering: OrderingPolicy,
    /// Inserts enqueued since the last `CREATE`.
    counter: usize,
    stats: DispatchStats,
}

impl Coordinator {
    pub fn new(
        classifier: Classifier,
        queue: WorkQueue,
        client: Arc<dyn DatabaseClient>,
        progress: Arc<dyn ProgressSink>,
        preamble: Arc<str>,
        ordering: OrderingPolicy,
    ) -> Self {
        Self {
            classifier,
            queue,
            client,
            progress,
            preamble,
            ordering,
            counter: 0,
            stats: DispatchStats::default(),
        }
    }

    /// Inserts enqueued since the last `CREATE` statement.
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Routes one statement.
    ///
    /// Only a closed work queue is an error; a failing serial statement is
    /// reported to the progress sink and processing continues.
    pub async fn dispatch(&mut self, stmt: RawStatement) -> Result<()> {
        self.stats.statements += 1;

        let class = self.classifier.classify(&stmt);
        debug!(%class, bytes = stmt.len(), "Dispatching statement");

        match class {
            DispatchClass::Suppressed { marker: false } => {
                self.stats.locks_suppressed += 1;
            }
            DispatchClass::Suppressed { marker: true } => {
                self.stats.unlock_markers += 1;
                self.progress.unlock_marker();
            }
            DispatchClass::Concurrent => {
                self.queue.push(stmt).await?;
                self.counter += 1;
                self.stats.enqueued += 1;
            }
            DispatchClass::Serial => self.execute_serial(stmt).await?,
        }

        Ok(())
    }

    async fn execute_serial(&mut self, stmt: RawStatement) -> Result<()> {
        if let Some(table) = create_target(&stmt) {
            debug!(table = %table, previous_inserts = self.counter, "Table boundary");
            self.progress.table_boundary(self.counter, &table);
            self.counter = 0;
            self.stats.tables += 1;
        }

        if self.ordering == OrderingPolicy::Barrier && self.queue.in_flight() > 0 {
            debug!(in_flight = self.queue.in_flight(), "Waiting for queued inserts");
            self.queue.wait_idle().await?;
        }

        let sql = with_preamble(&self.preamble, &stmt);
        match self.client.execute(&sql).await {
            Ok(()) => {
                self.stats.serial_succeeded += 1;
            }
            Err(e) => {
                self.stats.serial_failed += 1;
                warn!(error = %e, "Serial statement failed");
                self.progress.execution_failed(&stmt.to_sql(), &e);
            }
        }

        Ok(())
    }

    /// Closes the work queue and returns the dispatch counts.
    pub fn finish(self) -> DispatchStats {
        drop(self.queue);
        self.stats
    }
}
