//! Error types for toolchain discovery, engine construction and finalization.

use std::path::PathBuf;

/// Message used when finalize is reached without any engine error recorded.
pub const NO_ENGINE_MESSAGE: &str = "Could not create an execution engine";

/// Errors locating or probing the C++ compiler driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolchainError {
    /// None of the candidate drivers could be run.
    #[error("no C++ compiler found (tried {tried})")]
    NotFound {
        /// Comma-separated list of drivers that were tried.
        tried: String,
    },

    /// A driver was found but `--version` failed.
    #[error("failed to query compiler {driver}: {reason}")]
    Probe {
        /// The driver that was queried.
        driver: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

/// Errors constructing an execution engine.
///
/// These never surface directly: the session records the message and raises
/// it through [`FinalizeError::NoEngine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine's scratch directory could not be created.
    #[error("failed to create engine scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    /// The host cannot load native code produced by the toolchain.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// No toolchain was available to link modules.
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
}

/// Errors raised by [`finalize`](crate::ExecutionState::finalize).
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// No engine exists; carries the last engine construction error, if any.
    #[error("Error in finalize: {message}")]
    NoEngine {
        /// The recorded engine error or [`NO_ENGINE_MESSAGE`].
        message: String,
    },

    /// An I/O error occurred while writing objects for the linker.
    #[error("engine I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The linker rejected the pending modules.
    #[error("failed to link {modules}: {output}")]
    Link {
        /// Logical names of the modules being linked.
        modules: String,
        /// Linker diagnostics.
        output: String,
    },

    /// The linked shared object could not be loaded.
    #[error("failed to load {path}: {reason}")]
    Load {
        /// The shared object that failed to load.
        path: PathBuf,
        /// The loader's error message.
        reason: String,
    },
}
