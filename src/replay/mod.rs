//! Replay engine.
//!
//! Wires the statement scanner to the dispatch coordinator and the worker
//! pool, then drains the pool once the dump is exhausted.

mod coordinator;
mod pool;
mod progress;

pub use coordinator::{Coordinator, DispatchStats, OrderingPolicy};
pub use pool::{PoolSummary, WorkQueue, WorkerPool, QUEUE_DEPTH_PER_WORKER};
pub use progress::{ConsoleProgress, ProgressEvent, ProgressSink, RecordingProgress};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info};

use crate::config::ReplaySettings;
use crate::db::DatabaseClient;
use crate::dump::{Classifier, RawStatement, StatementScanner};
use crate::error::{ReplayError, Result};

/// Read buffer for the dump file.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Prepends the preamble to a statement's text.
pub(crate) fn with_preamble(preamble: &str, stmt: &RawStatement) -> String {
    let body = stmt.to_sql();
    let mut sql = String::with_capacity(preamble.len() + body.len());
    sql.push_str(preamble);
    sql.push_str(&body);
    sql
}

/// Totals for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Lines read from the dump, including skipped ones.
    pub lines: u64,
    pub dispatch: DispatchStats,
    pub pool: PoolSummary,
    pub elapsed: Duration,
}

impl ReplayStats {
    /// Statements that failed on either execution path.
    pub fn failed(&self) -> u64 {
        self.dispatch.serial_failed + self.pool.failed
    }
}

impl fmt::Display for ReplayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} statements from {} lines in {:.1}s: {} inserts ({} failed), {} serial ({} failed), {} tables, {} lock statements skipped",
            self.dispatch.statements,
            self.lines,
            self.elapsed.as_secs_f64(),
            self.dispatch.enqueued,
            self.pool.failed,
            self.dispatch.serial_succeeded + self.dispatch.serial_failed,
            self.dispatch.serial_failed,
            self.dispatch.tables,
            self.dispatch.locks_suppressed + self.dispatch.unlock_markers,
        )
    }
}

/// The result of a run: whatever was counted, plus the error that ended it early.
#[derive(Debug)]
pub struct ReplayReport {
    pub stats: ReplayStats,
    pub error: Option<ReplayError>,
}

impl ReplayReport {
    /// Converts the report into a `Result`, discarding the stats on error.
    pub fn into_result(self) -> Result<ReplayStats> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }
}

/// Replays dump streams against a database client.
pub struct Replayer {
    settings: ReplaySettings,
    client: Arc<dyn DatabaseClient>,
    progress: Arc<dyn ProgressSink>,
}

impl Replayer {
    /// Creates a replayer, rejecting settings the engine cannot run with.
    pub fn new(
        settings: ReplaySettings,
        client: Arc<dyn DatabaseClient>,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            client,
            progress,
        })
    }

    /// Opens `path` and replays it.
    pub async fn run_file(&self, path: &Path) -> Result<ReplayReport> {
        let file = File::open(path).await.map_err(|e| {
            ReplayError::stream(format!("cannot open dump file {}: {e}", path.display()))
        })?;
        Ok(self
            .run(BufReader::with_capacity(READ_BUFFER_SIZE, file))
            .await)
    }

    /// Replays every statement read from `reader`.
    ///
    /// Returns once the pool has fully drained. A stream error stops
    /// scanning but lets queued work finish; a configuration error (an
    /// oversized statement) also discards whatever is still queued.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, reader: R) -> ReplayReport {
        let started = Instant::now();
        let preamble: Arc<str> = Arc::from(self.settings.preamble.as_str());

        let (mut pool, queue) = WorkerPool::start(
            self.settings.workers,
            self.client.clone(),
            self.progress.clone(),
            preamble.clone(),
        );
        let mut coordinator = Coordinator::new(
            Classifier::new(self.settings.keyword_case),
            queue,
            self.client.clone(),
            self.progress.clone(),
            preamble,
            self.settings.ordering,
        );
        let mut scanner = StatementScanner::new(reader, self.settings.buffer_size);

        info!(
            workers = self.settings.workers,
            buffer_size = self.settings.buffer_size,
            ordering = ?self.settings.ordering,
            "Replay started"
        );

        let mut error = loop {
            match scanner.next_statement().await {
                Ok(Some(stmt)) => {
                    if let Err(e) = coordinator.dispatch(stmt).await {
                        break Some(e);
                    }
                }
                Ok(None) => break None,
                Err(e) => break Some(e),
            }
        };

        let dispatch = coordinator.finish();

        if let Some(e) = &error {
            error!(error = %e, "Scanning stopped");
            if matches!(e, ReplayError::Config(_)) {
                pool.abort();
            }
        }

        self.progress.draining();
        let pool_summary = match pool.join().await {
            Ok(summary) => summary,
            Err(e) => {
                error.get_or_insert(e);
                PoolSummary::default()
            }
        };

        let stats = ReplayStats {
            lines: scanner.lines_read(),
            dispatch,
            pool: pool_summary,
            elapsed: started.elapsed(),
        };
        info!(%stats, "Replay finished");

        ReplayReport { stats, error }
    }
}
