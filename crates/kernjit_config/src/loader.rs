//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::JitConfig;
use std::path::Path;

/// Name of the configuration file looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "kernjit.toml";

/// Loads and validates `kernjit.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<JitConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    let content =
        std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<JitConfig, ConfigError> {
    let config: JitConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks that configuration values are usable by the compiler driver.
///
/// Called by the loader and by sessions built from an in-code configuration.
pub fn validate_config(config: &JitConfig) -> Result<(), ConfigError> {
    if config.session.opt_level > 3 {
        return Err(ConfigError::Invalid {
            field: "session.opt_level",
            reason: format!("must be in 0..=3, got {}", config.session.opt_level),
        });
    }
    if config.session.precompiled_headers && config.session.pch_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid {
            field: "session.pch_path",
            reason: "empty while precompiled_headers is enabled".to_string(),
        });
    }
    if let Some(cpu) = &config.target.cpu {
        if cpu.is_empty() || cpu.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "target.cpu",
                reason: format!("'{cpu}' is not a CPU identifier"),
            });
        }
    }
    for feature in &config.target.features {
        let name = feature
            .strip_prefix('+')
            .or_else(|| feature.strip_prefix('-'))
            .unwrap_or("");
        if name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "target.features",
                reason: format!("'{feature}' must look like '+name' or '-name'"),
            });
        }
    }
    Ok(())
}
