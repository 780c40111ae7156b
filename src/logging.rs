//! Logging configuration for sqlreplay.
//!
//! Progress glyphs go to stdout, so logs default to stderr. A log file can be
//! used instead to keep the terminal free of anything but progress output.

use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::error::{ReplayError, Result};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging to a file.
///
/// The file is truncated on each run.
pub fn init_file_logging(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| ReplayError::config(format!("Could not create log directory: {e}")))?;
    }

    let log_file = File::create(log_path)
        .map_err(|e| ReplayError::config(format!("Could not create log file: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false) // No ANSI colors in file output
        .init();

    Ok(())
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to `log_file` if given, stderr otherwise.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => init_file_logging(path),
        None => {
            init_stderr_logging();
            Ok(())
        }
    }
}
