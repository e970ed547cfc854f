//! Session configuration for the kernjit compilation backend.
//!
//! A [`JitConfig`] carries every knob the embedding system may set before the
//! first compile of a session: precompiled headers, debug info, toolchain
//! overrides, header discovery roots and the target feature set. It can be
//! built in code or parsed from a `kernjit.toml` file.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, validate_config, CONFIG_FILE_NAME};
pub use types::*;
