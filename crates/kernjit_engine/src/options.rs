//! Frontend configuration applied uniformly to every compile of a session.
//!
//! The language and code generation settings are fixed by what the generated
//! kernels and their numeric-library dependencies need. Only debug info, the
//! precompiled header, the optimization level and the OpenMP mode come from
//! the session configuration.

use std::path::PathBuf;

use kernjit_config::{OpenMpMode, SessionConfig, TargetConfig};

/// C++ language features enabled for kernel sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageOptions {
    /// Language standard passed as `-std=`.
    pub standard: &'static str,
    /// C++ exception support.
    pub exceptions: bool,
    /// Run-time type information.
    pub rtti: bool,
    /// OpenMP loop annotations.
    pub openmp: OpenMpMode,
}

impl LanguageOptions {
    /// The dialect needed to parse generated kernels and their dependencies.
    ///
    /// `wchar_t` and `bool` are builtin types of the C++ dialect and need no
    /// flag.
    pub fn kernel_dialect(openmp: OpenMpMode) -> Self {
        Self {
            standard: "c++11",
            exceptions: true,
            rtti: true,
            openmp,
        }
    }
}

/// Relocation model of emitted object code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationModel {
    /// Absolute addressing; cannot be linked into a shared object on most hosts.
    Static,
    /// Position-independent code, required by the shared-object engine.
    Pic,
}

/// Floating-point calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatAbi {
    /// Floating-point values are passed in FP registers.
    Hard,
    /// Floating-point values are passed in integer registers.
    Soft,
}

/// Code generation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Optimization level, `0..=3`.
    pub opt_level: u8,
    /// Relocation model.
    pub relocation: RelocationModel,
    /// Link against POSIX threads.
    pub posix_threads: bool,
    /// Float ABI; only meaningful on ARM targets.
    pub float_abi: FloatAbi,
    /// Omit the frame pointer in leaf functions.
    pub omit_leaf_frame_pointer: bool,
    /// Loop vectorization.
    pub vectorize_loops: bool,
    /// Straight-line (SLP) vectorization.
    pub vectorize_slp: bool,
    /// Register static destructors with `__cxa_atexit`.
    pub cxa_atexit: bool,
    /// Emit full debug info.
    pub debug_info: bool,
    /// Precompiled header included ahead of every unit.
    pub precompiled_header: Option<PathBuf>,
}

impl CodegenOptions {
    /// Kernel code generation settings combined with the session toggles.
    pub fn from_session(session: &SessionConfig) -> Self {
        Self {
            opt_level: session.opt_level.min(3),
            relocation: RelocationModel::Pic,
            posix_threads: true,
            float_abi: FloatAbi::Hard,
            omit_leaf_frame_pointer: true,
            vectorize_loops: true,
            vectorize_slp: true,
            cxa_atexit: false,
            debug_info: session.debug_info,
            precompiled_header: session
                .precompiled_headers
                .then(|| session.pch_path.clone()),
        }
    }
}

/// Target CPU and instruction-set features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetOptions {
    /// CPU identifier passed as `-march=`.
    pub cpu: Option<String>,
    /// Features in `+name` / `-name` form.
    pub features: Vec<String>,
}

impl From<&TargetConfig> for TargetOptions {
    fn from(config: &TargetConfig) -> Self {
        Self {
            cpu: config.cpu.clone(),
            features: config.features.clone(),
        }
    }
}
