//! Compiled translation units.

use kernjit_common::{ContentHash, UnitName};

/// The code produced by one successful compile.
///
/// A module is exclusively owned: once handed to an engine it cannot be
/// added again.
#[derive(Debug)]
pub struct CompiledModule {
    name: UnitName,
    source_hash: ContentHash,
    object: Vec<u8>,
}

impl CompiledModule {
    /// Wraps relocatable object code compiled from `source`.
    pub fn new(name: UnitName, source: &str, object: Vec<u8>) -> Self {
        Self {
            name,
            source_hash: ContentHash::of_source(source),
            object,
        }
    }

    /// The logical unit name the module was compiled under.
    pub fn name(&self) -> &UnitName {
        &self.name
    }

    /// Hash of the source text, used to tell same-named units apart.
    pub fn source_hash(&self) -> ContentHash {
        self.source_hash
    }

    /// Relocatable object code.
    pub fn object(&self) -> &[u8] {
        &self.object
    }
}
