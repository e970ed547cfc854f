//! Logical translation-unit names.

use std::fmt;

/// The nominal name of a translation unit.
///
/// Used as the file name in diagnostics and as the key under which the
/// in-memory source is presented to the frontend. It never names a real file.
/// Because it is spliced into a `#line` directive it must not contain quotes,
/// backslashes or line breaks.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct UnitName(String);

/// A logical name that cannot be used for a translation unit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid translation unit name '{name}': {reason}")]
pub struct InvalidUnitName {
    /// The rejected name.
    pub name: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl UnitName {
    /// Validates and wraps a logical name.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidUnitName> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name is empty")
        } else if name.contains(['"', '\\']) {
            Some("name contains a quote or backslash")
        } else if name.contains(['\n', '\r']) {
            Some("name contains a line break")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(InvalidUnitName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a variant of the name safe to use as a file stem.
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
