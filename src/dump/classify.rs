//! Statement classification by leading keyword.
//!
//! Only the first four bytes of a statement are inspected; no parsing is done.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RawStatement;

/// How a statement is routed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchClass {
    /// Discarded without execution (`LOCK`/`UNLOCK TABLES`).
    ///
    /// `marker` is set for `UNLOCK`, which is surfaced as a progress glyph.
    Suppressed { marker: bool },
    /// Row inserts, executed out of order by the worker pool.
    Concurrent,
    /// Everything else, executed in document order by the coordinator.
    Serial,
}

impl fmt::Display for DispatchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suppressed { .. } => write!(f, "Suppressed"),
            Self::Concurrent => write!(f, "Concurrent"),
            Self::Serial => write!(f, "Serial"),
        }
    }
}

/// Case handling for the keyword prefix comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordCase {
    /// Prefixes must match byte for byte (`insert` is Serial).
    #[default]
    Exact,
    /// ASCII case is ignored when comparing prefixes.
    Ignore,
}

impl std::str::FromStr for KeywordCase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "ignore" => Ok(Self::Ignore),
            _ => Err(format!(
                "Invalid keyword case: {s}. Expected: exact or ignore"
            )),
        }
    }
}

/// Prefix rules, checked in order.
const RULES: &[(&[u8; 4], DispatchClass)] = &[
    (b"LOCK", DispatchClass::Suppressed { marker: false }),
    (b"UNLO", DispatchClass::Suppressed { marker: true }),
    (b"INSE", DispatchClass::Concurrent),
];

/// Stateless prefix classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    case: KeywordCase,
}

impl Classifier {
    /// Creates a classifier with the given case handling.
    pub fn new(case: KeywordCase) -> Self {
        Self { case }
    }

    /// Returns the dispatch class of a statement.
    pub fn classify(&self, stmt: &RawStatement) -> DispatchClass {
        let Some(prefix) = stmt.as_bytes().get(..4) else {
            return DispatchClass::Serial;
        };

        RULES
            .iter()
            .find(|(keyword, _)| match self.case {
                KeywordCase::Exact => prefix == keyword.as_slice(),
                KeywordCase::Ignore => prefix.eq_ignore_ascii_case(keyword.as_slice()),
            })
            .map(|(_, class)| *class)
            .unwrap_or(DispatchClass::Serial)
    }
}

/// Classifies with exact keyword matching.
pub fn classify(stmt: &RawStatement) -> DispatchClass {
    Classifier::default().classify(stmt)
}

/// Returns the object name targeted by a `CREATE` statement.
///
/// The name is the third whitespace-separated token (``CREATE TABLE `users` (...)``)
/// with backtick quoting stripped, or empty if there is none. Returns `None`
/// when the first token is not `CREATE`.
pub fn create_target(stmt: &RawStatement) -> Option<String> {
    let sql = stmt.to_sql();
    let mut tokens = sql.split_ascii_whitespace();

    if !tokens.next()?.eq_ignore_ascii_case("CREATE") {
        return None;
    }

    Some(
        tokens
            .nth(1)
            .map(|name| name.trim_matches('`').to_string())
            .unwrap_or_default(),
    )
}
