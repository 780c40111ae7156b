//! sqlreplay - Replay large SQL dumps against a live MySQL server.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod dump;
pub mod error;
pub mod logging;
pub mod replay;
