//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors raised while reading, parsing or validating a session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The content is not valid TOML or does not match the schema.
    #[error("malformed configuration: {0}")]
    Parse(String),

    /// A value is well-formed but unusable by the compiler driver.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Dotted key of the offending value, e.g. `session.opt_level`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_field() {
        let err = ConfigError::Invalid {
            field: "session.opt_level",
            reason: "must be in 0..=3, got 7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid `session.opt_level`: must be in 0..=3, got 7"
        );
    }

    #[test]
    fn read_error_names_the_file() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/kernjit.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("cannot read /etc/kernjit.toml"));
        assert!(msg.contains("no such file"));
    }
}
