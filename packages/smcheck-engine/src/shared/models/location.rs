//! Source location types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A position in a source file (program source or checker DSL source).
///
/// Ordering is (file, line, column), which gives source-ordered diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Location at the start of a line
    pub fn line(file: impl Into<Arc<str>>, line: u32) -> Self {
        Self::new(file, line, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
