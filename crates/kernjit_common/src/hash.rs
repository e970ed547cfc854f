//! Source hashing for compiled translation units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// XXH3-128 digest of a unit's source text.
///
/// Tells same-named units apart and gives their object files inside an
/// engine's scratch directory distinct names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(u128);

impl ContentHash {
    /// Hashes raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data))
    }

    /// Hashes source text.
    pub fn of_source(source: &str) -> Self {
        Self::from_bytes(source.as_bytes())
    }

    /// The high 64 bits as 16 hex digits, enough for scratch file names.
    pub fn short(&self) -> String {
        format!("{:016x}", self.0 >> 64)
    }

    /// The full digest.
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", &self.short()[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_same_hash() {
        let src = r#"extern "C" int f() { return 1; }"#;
        assert_eq!(ContentHash::of_source(src), ContentHash::of_source(src));
    }

    #[test]
    fn whitespace_changes_hash() {
        assert_ne!(
            ContentHash::of_source("int f();"),
            ContentHash::of_source("int  f();")
        );
    }

    #[test]
    fn display_and_short_agree() {
        let h = ContentHash::of_source("kernel");
        let full = h.to_string();
        assert_eq!(full.len(), 32);
        assert_eq!(h.short().len(), 16);
        assert!(full.starts_with(&h.short()));
    }

    #[test]
    fn debug_is_abbreviated() {
        let s = format!("{:?}", ContentHash::of_source("kernel"));
        assert!(s.starts_with("ContentHash("));
        assert!(s.len() < 20);
    }

    #[test]
    fn serializes_as_integer() {
        let h = ContentHash::of_source("serde test");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, h.as_u128().to_string());
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
