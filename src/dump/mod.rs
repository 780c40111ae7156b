//! Dump file reading and statement classification.
//!
//! Turns a raw byte stream of SQL dump text into discrete statements and
//! decides how each one is dispatched.

mod classify;
mod scanner;
mod statement;

pub use classify::{classify, create_target, Classifier, DispatchClass, KeywordCase};
pub use scanner::{StatementScanner, DEFAULT_BUFFER_SIZE};
pub use statement::RawStatement;
