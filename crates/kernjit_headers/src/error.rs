//! Error types for header cache operations.

use std::path::PathBuf;

/// Errors raised while materializing cached headers.
///
/// Discovery itself is best-effort: unreadable directories and files are
/// skipped rather than reported. Only writing the overlay can fail.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// An I/O error occurred while writing the header overlay.
    #[error("header cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The overlay was requested before the cache was marked valid.
    #[error("header overlay requested before the cache was populated")]
    NotValid,
}
