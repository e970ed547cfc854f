//! Diagnostic severity levels ordered from least to most severe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity level reported by the compiler frontend.
///
/// Ordered from least severe (`Remark`) to most severe (`Fatal`), matching the
/// derived `PartialOrd`/`Ord` implementation based on declaration order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Optimization or informational remark.
    Remark,
    /// Additional context attached to another diagnostic.
    Note,
    /// A potential issue that does not fail the compile.
    Warning,
    /// A definite problem; the compile produces no module.
    Error,
    /// An error after which the frontend stopped processing.
    Fatal,
}

impl Severity {
    /// Returns `true` if this severity fails a compile.
    pub fn is_error(self) -> bool {
        self >= Severity::Error
    }

    /// Parses the severity keyword used in compiler output.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "remark" => Some(Severity::Remark),
            "note" => Some(Severity::Note),
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "fatal error" => Some(Severity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Remark => write!(f, "remark"),
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal error"),
        }
    }
}
