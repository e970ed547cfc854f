//! Configuration types deserialized from `kernjit.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// Header root for the linear-algebra library, fixed when the host is built.
const BUILD_EIGEN_HEADERS: Option<&str> = option_env!("KERNJIT_EIGEN_HEADERS");

/// Header root for the framework's own headers, fixed when the host is built.
const BUILD_FRAMEWORK_HEADERS: Option<&str> = option_env!("KERNJIT_FRAMEWORK_HEADERS");

/// Instruction-set extensions the generated kernels are vectorized for.
pub const KERNEL_TARGET_FEATURES: &[&str] = &[
    "+sse", "+sse2", "+sse3", "+ssse3", "+sse4.1", "+sse4.2", "+avx", "+avx2", "+fma",
];

/// CPU the generated kernels are tuned for.
pub const KERNEL_TARGET_CPU: &str = "broadwell";

/// The top-level configuration of a compilation session.
///
/// Every section is optional in TOML; an empty file yields the same
/// configuration as [`JitConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JitConfig {
    /// Per-session toggles (debug info, precompiled headers, optimization).
    #[serde(default)]
    pub session: SessionConfig,
    /// Compiler driver selection and resource directory override.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Header discovery and caching.
    #[serde(default)]
    pub headers: HeaderConfig,
    /// Target CPU and instruction-set features.
    #[serde(default)]
    pub target: TargetConfig,
    /// Language dialect options.
    #[serde(default)]
    pub language: LanguageConfig,
}

/// Toggles applied uniformly to every compile of a session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Include a precompiled header ahead of every translation unit.
    pub precompiled_headers: bool,
    /// Path of the precompiled header used when `precompiled_headers` is set.
    pub pch_path: PathBuf,
    /// Emit full debug information.
    pub debug_info: bool,
    /// Frontend optimization level, `0..=3`.
    pub opt_level: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            precompiled_headers: false,
            pch_path: PathBuf::from("kernels.pch"),
            debug_info: false,
            opt_level: 3,
        }
    }
}

/// Compiler driver selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Explicit compiler driver. When unset, `clang++` then `g++` is tried.
    pub compiler: Option<PathBuf>,
    /// Builtin resource directory. When unset it is resolved per compile.
    pub resource_dir: Option<PathBuf>,
}

/// Header discovery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Read every discovered header into the in-memory cache.
    pub cache_files: bool,
    /// Suppress the driver's own search paths so discovery fully controls
    /// header resolution.
    pub isolate_system: bool,
    /// Linear-algebra library header root.
    pub eigen: Option<PathBuf>,
    /// Framework header root.
    pub framework: Option<PathBuf>,
    /// Further user header roots, searched after the two project roots.
    pub extra: Vec<PathBuf>,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            cache_files: false,
            isolate_system: true,
            eigen: BUILD_EIGEN_HEADERS.map(PathBuf::from),
            framework: BUILD_FRAMEWORK_HEADERS.map(PathBuf::from),
            extra: Vec::new(),
        }
    }
}

/// Target CPU and feature selection.
///
/// Defaults to the kernels' vectorization baseline on x86_64 and to the
/// driver's default target elsewhere. The host CPU is never queried.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Target CPU identifier, passed as `-march=`.
    pub cpu: Option<String>,
    /// Feature flags in `+name` / `-name` form.
    pub features: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        if cfg!(target_arch = "x86_64") {
            Self {
                cpu: Some(KERNEL_TARGET_CPU.to_string()),
                features: KERNEL_TARGET_FEATURES.iter().map(|f| f.to_string()).collect(),
            }
        } else {
            Self {
                cpu: None,
                features: Vec::new(),
            }
        }
    }
}

/// Language dialect options that are not fixed by the kernel dialect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// How OpenMP loop annotations are honoured.
    pub openmp: OpenMpMode,
}

/// OpenMP support level.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpenMpMode {
    /// Pragmas are ignored.
    Off,
    /// Only `simd` annotations are honoured; no runtime library is linked (default).
    #[default]
    Simd,
    /// Full OpenMP, which links the OpenMP runtime into the engine.
    Full,
}
