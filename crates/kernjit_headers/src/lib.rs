//! Header search discovery and the process-wide header cache.
//!
//! The first compile of a process scans the filesystem for toolchain,
//! platform, C++ standard library and project headers. The result is kept in
//! a [`HeaderCache`] that is frozen once populated, so later compiles re-use
//! the discovered search paths (and, optionally, the header contents) without
//! touching the filesystem again.

#![warn(missing_docs)]

pub mod cache;
pub mod discovery;
pub mod error;

pub use cache::{HeaderCache, HeaderSearchEntry, SearchKind, SharedHeaderCache};
pub use discovery::{is_version_number, populate, HeaderLayout, PopulateReport};
pub use error::HeaderError;
