//! Progress and diagnostics output.
//!
//! The replay engine reports through a [`ProgressSink`]; nothing written here
//! feeds back into control flow.

use std::io::{self, Stdout, Write};
use std::sync::Mutex;

use crate::error::ReplayError;

/// Glyph printed for each successfully executed insert.
pub const STATEMENT_GLYPH: &str = ".";

/// Glyph printed when an `UNLOCK TABLES` is suppressed.
pub const UNLOCK_GLYPH: &str = "⌛";

/// Receives progress events from the coordinator and the workers.
pub trait ProgressSink: Send + Sync {
    /// A queued statement executed successfully.
    fn statement_done(&self);

    /// An `UNLOCK TABLES` statement was discarded.
    fn unlock_marker(&self);

    /// A `CREATE` statement starts a new table; `statements` inserts were
    /// enqueued since the previous one.
    fn table_boundary(&self, statements: usize, table: &str);

    /// A statement failed to execute.
    fn execution_failed(&self, sql: &str, error: &ReplayError);

    /// Scanning is over and the pool is draining.
    fn draining(&self);
}

/// Writes glyphs and error lines to a terminal-style writer.
pub struct ConsoleProgress<W> {
    out: Mutex<W>,
}

impl ConsoleProgress<Stdout> {
    /// Creates a sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    /// Creates a sink writing to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, text: &str) {
        // A broken progress stream must not stop the load.
        if let Ok(mut out) = self.out.lock() {
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn statement_done(&self) {
        self.emit(STATEMENT_GLYPH);
    }

    fn unlock_marker(&self) {
        self.emit(UNLOCK_GLYPH);
    }

    fn table_boundary(&self, statements: usize, table: &str) {
        self.emit(&format!("{statements} statements\n🐑 {table}"));
    }

    fn execution_failed(&self, sql: &str, error: &ReplayError) {
        self.emit(&format!("\n{sql}: {error}\n"));
    }

    fn draining(&self) {
        self.emit("\nWaiting for workers...\n");
    }
}

/// A progress event, as captured by [`RecordingProgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StatementDone,
    UnlockMarker,
    TableBoundary { statements: usize, table: String },
    ExecutionFailed { sql: String, error: String },
    Draining,
}

/// Sink that keeps every event in memory, for tests and tooling.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events received so far, in arrival order.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Counts events equal to `event`.
    pub fn count(&self, event: &ProgressEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressSink for RecordingProgress {
    fn statement_done(&self) {
        self.push(ProgressEvent::StatementDone);
    }

    fn unlock_marker(&self) {
        self.push(ProgressEvent::UnlockMarker);
    }

    fn table_boundary(&self, statements: usize, table: &str) {
        self.push(ProgressEvent::TableBoundary {
            statements,
            table: table.to_string(),
        });
    }

    fn execution_failed(&self, sql: &str, error: &ReplayError) {
        self.push(ProgressEvent::ExecutionFailed {
            sql: sql.to_string(),
            error: error.to_string(),
        });
    }

    fn draining(&self) {
        self.push(ProgressEvent::Draining);
    }
}
