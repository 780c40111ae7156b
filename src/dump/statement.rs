//! A single complete statement read from a dump.

use std::borrow::Cow;
use std::fmt;

/// The bytes of one complete SQL statement, terminator included.
///
/// Owned by whichever stage currently holds it; handing it on moves it.
#[derive(Clone, PartialEq, Eq)]
pub struct RawStatement(Vec<u8>);

impl RawStatement {
    /// Wraps an accumulated byte buffer.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw statement bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the statement as text, replacing invalid UTF-8 sequences.
    pub fn to_sql(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    /// Length of the statement in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the statement holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for RawStatement {
    fn from(sql: &str) -> Self {
        Self(sql.as_bytes().to_vec())
    }
}

impl fmt::Debug for RawStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawStatement").field(&self.to_sql()).finish()
    }
}

impl fmt::Display for RawStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
