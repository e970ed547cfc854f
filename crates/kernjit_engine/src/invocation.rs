//! Per-compile frontend invocation.
//!
//! An [`Invocation`] is built fresh for every compile. All configuration is
//! programmatic: the only caller-supplied input is the logical unit name, and
//! the primary source is piped on stdin, never read from disk.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Output, Stdio};

use kernjit_common::UnitName;
use kernjit_config::OpenMpMode;
use kernjit_headers::{HeaderCache, SearchKind};

use crate::options::{CodegenOptions, FloatAbi, LanguageOptions, RelocationModel, TargetOptions};
use crate::toolchain::{CompilerFamily, Toolchain};

/// Frontend arguments for compiling one translation unit.
#[derive(Debug, Clone)]
pub struct Invocation {
    unit: UnitName,
    family: CompilerFamily,
    args: Vec<OsString>,
}

impl Invocation {
    /// Starts an invocation for `unit` in the dialect of `family`.
    ///
    /// Diagnostics are requested without color or source excerpts, one line
    /// per diagnostic, which is the form the output parser expects.
    pub fn new(unit: UnitName, family: CompilerFamily) -> Self {
        let no_excerpt = match family {
            CompilerFamily::Clang => "-fno-caret-diagnostics",
            CompilerFamily::Gcc => "-fno-diagnostics-show-caret",
        };
        Self {
            unit,
            family,
            args: vec!["-fdiagnostics-color=never".into(), no_excerpt.into()],
        }
    }

    /// The logical unit being compiled.
    pub fn unit(&self) -> &UnitName {
        &self.unit
    }

    /// Arguments accumulated so far, excluding input and output.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn push(&mut self, arg: impl Into<OsString>) {
        self.args.push(arg.into());
    }

    /// Re-injects the cached search paths.
    ///
    /// When the cache has materialized an overlay, each search directory is
    /// redirected into it so the cached contents are what the frontend reads.
    /// With `isolate` set, the driver's own search paths are disabled.
    pub fn apply_header_search(&mut self, cache: &HeaderCache, isolate: bool) {
        if isolate {
            self.push("-nostdinc");
            self.push("-nostdinc++");
        }
        for entry in cache.include_paths() {
            let dir = cache
                .overlay_path(&entry.path)
                .unwrap_or_else(|| entry.path.clone());
            match entry.kind {
                SearchKind::System => self.push("-isystem"),
                SearchKind::User => self.push("-I"),
            }
            self.push(dir);
        }
    }

    /// Enables the kernel language dialect.
    pub fn apply_language(&mut self, lang: &LanguageOptions) {
        self.push(format!("-std={}", lang.standard));
        self.push(if lang.exceptions { "-fexceptions" } else { "-fno-exceptions" });
        self.push(if lang.rtti { "-frtti" } else { "-fno-rtti" });
        match lang.openmp {
            OpenMpMode::Off => {}
            OpenMpMode::Simd => self.push("-fopenmp-simd"),
            OpenMpMode::Full => self.push("-fopenmp"),
        }
    }

    /// Applies code generation settings.
    pub fn apply_codegen(&mut self, cg: &CodegenOptions) {
        self.push(format!("-O{}", cg.opt_level.min(3)));
        match cg.relocation {
            RelocationModel::Pic => self.push("-fPIC"),
            RelocationModel::Static => self.push("-fno-pic"),
        }
        if cg.posix_threads {
            self.push("-pthread");
        }
        if cfg!(target_arch = "arm") {
            match cg.float_abi {
                FloatAbi::Hard => self.push("-mfloat-abi=hard"),
                FloatAbi::Soft => self.push("-mfloat-abi=soft"),
            }
        }
        if cg.omit_leaf_frame_pointer {
            self.push("-momit-leaf-frame-pointer");
        }
        let (loops, slp) = match self.family {
            CompilerFamily::Clang => ("-fvectorize", "-fslp-vectorize"),
            CompilerFamily::Gcc => ("-ftree-loop-vectorize", "-ftree-slp-vectorize"),
        };
        if cg.vectorize_loops {
            self.push(loops);
        }
        if cg.vectorize_slp {
            self.push(slp);
        }
        if !cg.cxa_atexit {
            self.push("-fno-use-cxa-atexit");
        }
        if cg.debug_info {
            self.push("-g");
        }
        if let Some(pch) = &cg.precompiled_header {
            match self.family {
                CompilerFamily::Clang => {
                    self.push("-include-pch");
                    self.push(pch.as_os_str());
                    self.push("-Xclang");
                    self.push("-fno-validate-pch");
                }
                CompilerFamily::Gcc => {
                    // gcc picks up `<header>.gch` when asked to include `<header>`.
                    let header = if pch.extension().is_some_and(|e| e == "gch") {
                        pch.with_extension("")
                    } else {
                        pch.clone()
                    };
                    self.push("-include");
                    self.push(header);
                }
            }
        }
    }

    /// Selects the target CPU and instruction-set features.
    pub fn apply_target(&mut self, target: &TargetOptions) {
        if let Some(cpu) = &target.cpu {
            self.push(format!("-march={cpu}"));
        }
        for feature in &target.features {
            if let Some(name) = feature.strip_prefix('+') {
                self.push(format!("-m{name}"));
            } else if let Some(name) = feature.strip_prefix('-') {
                self.push(format!("-mno-{name}"));
            }
        }
    }

    /// Text prepended to the source so diagnostics name the logical unit.
    pub fn source_preamble(&self) -> String {
        format!("#line 1 \"{}\"\n", self.unit)
    }

    /// Runs the frontend in compile-only mode, writing object code to `object`.
    ///
    /// Blocks until the driver exits. The caller inspects the exit status and
    /// stderr; an `Err` means the driver could not be run at all.
    pub fn execute(
        &self,
        toolchain: &Toolchain,
        source: &str,
        object: &Path,
    ) -> std::io::Result<Output> {
        let mut child = toolchain
            .command()
            .args(&self.args)
            .args(["-c", "-x", "c++", "-o"])
            .arg(object)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child.stdin.take();
        let preamble = self.source_preamble();
        // Feed stdin from a second thread so a chatty frontend cannot fill
        // the stderr pipe while we are still writing.
        std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    let _ = stdin
                        .write_all(preamble.as_bytes())
                        .and_then(|()| stdin.write_all(source.as_bytes()));
                });
            }
            child.wait_with_output()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernjit_config::SessionConfig;
    use std::path::PathBuf;

    fn has(inv: &Invocation, arg: &str) -> bool {
        inv.args().iter().any(|a| a == arg)
    }

    fn unit() -> UnitName {
        UnitName::new("k.cpp").unwrap()
    }

    #[test]
    fn preamble_names_unit() {
        let inv = Invocation::new(unit(), CompilerFamily::Clang);
        assert_eq!(inv.source_preamble(), "#line 1 \"k.cpp\"\n");
    }

    #[test]
    fn diagnostics_without_source_excerpts() {
        let clang = Invocation::new(unit(), CompilerFamily::Clang);
        assert!(has(&clang, "-fdiagnostics-color=never"));
        assert!(has(&clang, "-fno-caret-diagnostics"));
        let gcc = Invocation::new(unit(), CompilerFamily::Gcc);
        assert!(has(&gcc, "-fno-diagnostics-show-caret"));
        assert!(!has(&gcc, "-fno-caret-diagnostics"));
    }

    #[test]
    fn language_flags() {
        let mut inv = Invocation::new(unit(), CompilerFamily::Gcc);
        inv.apply_language(&LanguageOptions::kernel_dialect(OpenMpMode::Simd));
        assert!(has(&inv, "-std=c++11"));
        assert!(has(&inv, "-fexceptions"));
        assert!(has(&inv, "-frtti"));
        assert!(has(&inv, "-fopenmp-simd"));
        assert!(!has(&inv, "-fopenmp"));
    }

    #[test]
    fn full_openmp_flag() {
        let mut inv = Invocation::new(unit(), CompilerFamily::Clang);
        inv.apply_language(&LanguageOptions::kernel_dialect(OpenMpMode::Full));
        assert!(has(&inv, "-fopenmp"));
    }

    #[test]
    fn clang_codegen_flags() {
        let mut inv = Invocation::new(unit(), CompilerFamily::Clang);
        inv.apply_codegen(&CodegenOptions::from_session(&SessionConfig::default()));
        for flag in [
            "-O3",
            "-fPIC",
            "-pthread",
            "-momit-leaf-frame-pointer",
            "-fvectorize",
            "-fslp-vectorize",
            "-fno-use-cxa-atexit",
        ] {
            assert!(has(&inv, flag), "missing {flag}");
        }
        assert!(!has(&inv, "-g"));
    }

    #[test]
    fn gcc_vectorize_spelling() {
        let mut inv = Invocation::new(unit(), CompilerFamily::Gcc);
        inv.apply_codegen(&CodegenOptions::from_session(&SessionConfig::default()));
        assert!(has(&inv, "-ftree-loop-vectorize"));
        assert!(has(&inv, "-ftree-slp-vectorize"));
        assert!(!has(&inv, "-fvectorize"));
    }

    #[test]
    fn debug_and_pch_flags() {
        let session = SessionConfig {
            debug_info: true,
            precompiled_headers: true,
            pch_path: PathBuf::from("/opt/k/kernels.pch"),
            ..SessionConfig::default()
        };
        let mut inv = Invocation::new(unit(), CompilerFamily::Clang);
        inv.apply_codegen(&CodegenOptions::from_session(&session));
        assert!(has(&inv, "-g"));
        assert!(has(&inv, "-include-pch"));
        assert!(has(&inv, "/opt/k/kernels.pch"));
        assert!(has(&inv, "-fno-validate-pch"));
    }

    #[test]
    fn gcc_pch_strips_gch() {
        let session = SessionConfig {
            precompiled_headers: true,
            pch_path: PathBuf::from("/opt/k/kernels.hpp.gch"),
            ..SessionConfig::default()
        };
        let mut inv = Invocation::new(unit(), CompilerFamily::Gcc);
        inv.apply_codegen(&CodegenOptions::from_session(&session));
        assert!(has(&inv, "-include"));
        assert!(has(&inv, "/opt/k/kernels.hpp"));
    }

    #[test]
    fn target_flags() {
        let mut inv = Invocation::new(unit(), CompilerFamily::Clang);
        inv.apply_target(&TargetOptions {
            cpu: Some("broadwell".to_string()),
            features: vec!["+sse4.1".to_string(), "+fma".to_string(), "-avx512f".to_string()],
        });
        assert!(has(&inv, "-march=broadwell"));
        assert!(has(&inv, "-msse4.1"));
        assert!(has(&inv, "-mfma"));
        assert!(has(&inv, "-mno-avx512f"));
    }

    #[test]
    fn header_search_order_and_kinds() {
        let mut cache = HeaderCache::new();
        cache.add_path("/usr/include/c++/12");
        cache.add_entry("/opt/kernels", SearchKind::User);
        cache.set_valid();

        let mut inv = Invocation::new(unit(), CompilerFamily::Clang);
        let base = inv.args().len();
        inv.apply_header_search(&cache, true);
        let args: Vec<_> = inv.args().iter().skip(base).cloned().collect();
        let expected: Vec<OsString> = [
            "-nostdinc",
            "-nostdinc++",
            "-isystem",
            "/usr/include/c++/12",
            "-I",
            "/opt/kernels",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn header_search_without_isolation() {
        let mut cache = HeaderCache::new();
        cache.set_valid();
        let mut inv = Invocation::new(unit(), CompilerFamily::Gcc);
        inv.apply_header_search(&cache, false);
        assert!(!has(&inv, "-nostdinc"));
    }
}
