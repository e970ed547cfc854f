//! Source locations reported by the frontend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A position inside a translation unit or header.
///
/// Line and column values are 1-indexed. For the primary source the file is
/// the unit's logical name, not a real path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// The file (or logical unit name) the diagnostic points into.
    pub file: PathBuf,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed), when the frontend reported one.
    pub column: Option<u32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)?;
        if let Some(col) = self.column {
            write!(f, ":{col}")?;
        }
        Ok(())
    }
}
