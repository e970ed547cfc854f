//! C++ compiler driver detection.
//!
//! The driver plays the role of the frontend (source to object code) and of
//! the linker (objects to a loadable shared object).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::error::ToolchainError;

/// Drivers tried, in order, when no compiler is configured.
const CANDIDATES: &[&str] = &["clang++", "g++", "c++"];

static HOST_TOOLCHAIN: OnceLock<Result<Toolchain, ToolchainError>> = OnceLock::new();

/// Command-line dialect spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerFamily {
    /// LLVM clang.
    Clang,
    /// GNU gcc.
    Gcc,
}

impl CompilerFamily {
    /// Classifies a driver from its `--version` banner.
    pub fn from_version_banner(banner: &str) -> Self {
        if banner.to_ascii_lowercase().contains("clang") {
            CompilerFamily::Clang
        } else {
            CompilerFamily::Gcc
        }
    }
}

/// A detected C++ compiler driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    driver: PathBuf,
    family: CompilerFamily,
    version: String,
}

impl Toolchain {
    /// Probes `driver` with `--version` and classifies it.
    pub fn detect(driver: impl Into<PathBuf>) -> Result<Self, ToolchainError> {
        let driver = driver.into();
        let output = Command::new(&driver)
            .arg("--version")
            .output()
            .map_err(|e| ToolchainError::Probe {
                driver: driver.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ToolchainError::Probe {
                driver,
                reason: format!("--version exited with {}", output.status),
            });
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        let version = banner.lines().next().unwrap_or_default().trim().to_string();
        Ok(Self {
            family: CompilerFamily::from_version_banner(&banner),
            driver,
            version,
        })
    }

    /// Finds the first working driver among `clang++`, `g++` and `c++`.
    pub fn detect_host() -> Result<Self, ToolchainError> {
        for candidate in CANDIDATES {
            match Self::detect(candidate) {
                Ok(toolchain) => return Ok(toolchain),
                Err(e) => tracing::debug!(error = %e, "compiler candidate rejected"),
            }
        }
        Err(ToolchainError::NotFound {
            tried: CANDIDATES.join(", "),
        })
    }

    /// Builds a toolchain without probing. Used when the caller already
    /// knows the driver's family.
    pub fn from_parts(driver: impl Into<PathBuf>, family: CompilerFamily) -> Self {
        Self {
            driver: driver.into(),
            family,
            version: String::new(),
        }
    }

    /// Path or name of the driver executable.
    pub fn driver(&self) -> &Path {
        &self.driver
    }

    /// The driver's command-line dialect.
    pub fn family(&self) -> CompilerFamily {
        self.family
    }

    /// First line of the driver's `--version` banner.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns a fresh command running the driver.
    pub fn command(&self) -> Command {
        Command::new(&self.driver)
    }

    /// Asks the driver where its builtin resource directory lives.
    ///
    /// clang reports it directly. gcc reports its builtin `include`
    /// directory, whose parent is the resource directory.
    pub fn query_resource_dir(&self) -> Option<PathBuf> {
        let flag = match self.family {
            CompilerFamily::Clang => "-print-resource-dir",
            CompilerFamily::Gcc => "-print-file-name=include",
        };
        let output = self.command().arg(flag).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let printed = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        // gcc echoes the bare name back when it cannot find the file.
        if !printed.is_absolute() {
            return None;
        }
        let dir = match self.family {
            CompilerFamily::Clang => printed,
            CompilerFamily::Gcc => printed.parent()?.to_path_buf(),
        };
        dir.is_dir().then_some(dir)
    }
}

/// Detects the host toolchain once per process.
///
/// Later calls return the cached result, so this is safe to call before every
/// compile from any number of sessions.
pub fn initialize_targets() -> Result<Toolchain, ToolchainError> {
    HOST_TOOLCHAIN
        .get_or_init(|| {
            let detected = Toolchain::detect_host();
            match &detected {
                Ok(t) => tracing::info!(
                    driver = %t.driver().display(),
                    version = t.version(),
                    "detected C++ toolchain"
                ),
                Err(e) => tracing::warn!(error = %e, "no C++ toolchain available"),
            }
            detected
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_clang_banner() {
        let banner = "Ubuntu clang version 17.0.6\nTarget: x86_64-pc-linux-gnu\n";
        assert_eq!(CompilerFamily::from_version_banner(banner), CompilerFamily::Clang);
        let apple = "Apple clang version 15.0.0 (clang-1500.1.0.2.5)";
        assert_eq!(CompilerFamily::from_version_banner(apple), CompilerFamily::Clang);
    }

    #[test]
    fn classify_gcc_banner() {
        let banner = "g++ (Debian 12.2.0-14) 12.2.0\nCopyright (C) 2022\n";
        assert_eq!(CompilerFamily::from_version_banner(banner), CompilerFamily::Gcc);
    }

    #[test]
    fn detect_missing_driver_fails() {
        let err = Toolchain::detect("/nonexistent/kernjit-c++").unwrap_err();
        assert!(matches!(err, ToolchainError::Probe { .. }));
    }

    #[test]
    fn initialize_is_idempotent() {
        assert_eq!(initialize_targets().ok(), initialize_targets().ok());
    }

    #[test]
    fn from_parts_keeps_family() {
        let t = Toolchain::from_parts("clang++", CompilerFamily::Clang);
        assert_eq!(t.family(), CompilerFamily::Clang);
        assert_eq!(t.driver(), Path::new("clang++"));
        assert_eq!(t.version(), "");
    }
}
