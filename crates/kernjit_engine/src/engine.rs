//! The execution engine: links compiled modules and loads them as native code.
//!
//! Each finalize links the modules added since the previous finalize into a
//! fresh shared object inside the engine's scratch directory and loads it
//! with global symbol visibility, so later units can call into earlier ones.
//! Symbol lookup searches the loaded units newest first.

use std::collections::HashSet;
use std::ffi::{c_void, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use kernjit_common::UnitName;
use tempfile::TempDir;

use crate::error::{EngineError, FinalizeError};
use crate::module::CompiledModule;
use crate::toolchain::Toolchain;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Optimization level requested for the link step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineOptLevel {
    /// `-O0`.
    None,
    /// `-O1`.
    Less,
    /// `-O2`.
    #[default]
    Default,
    /// `-O3`.
    Aggressive,
}

impl EngineOptLevel {
    /// The driver flag for this level.
    pub fn as_flag(self) -> &'static str {
        match self {
            EngineOptLevel::None => "-O0",
            EngineOptLevel::Less => "-O1",
            EngineOptLevel::Default => "-O2",
            EngineOptLevel::Aggressive => "-O3",
        }
    }
}

struct LoadedUnit {
    library: libloading::Library,
    path: PathBuf,
    modules: Vec<UnitName>,
}

/// Links and executes compiled modules.
///
/// Created from its first module. Modules added afterwards accumulate until
/// the next [`finalize`](Self::finalize).
pub struct ExecutionEngine {
    // Loaded libraries must be closed before the scratch directory goes away.
    units: Vec<LoadedUnit>,
    pending: Vec<CompiledModule>,
    names: HashSet<UnitName>,
    toolchain: Toolchain,
    opt_level: EngineOptLevel,
    link_args: Vec<OsString>,
    id: u64,
    generation: u64,
    objects_written: usize,
    last_finalize_failed: bool,
    scratch: TempDir,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("id", &self.id)
            .field("units", &self.units.len())
            .field("pending", &self.pending.len())
            .field("scratch", &self.scratch.path())
            .finish()
    }
}

impl ExecutionEngine {
    /// Creates an engine owning `module`.
    pub fn create(
        module: CompiledModule,
        toolchain: Toolchain,
        opt_level: EngineOptLevel,
    ) -> Result<Self, EngineError> {
        if !cfg!(unix) {
            return Err(EngineError::UnsupportedPlatform(
                std::env::consts::OS.to_string(),
            ));
        }
        let scratch = tempfile::Builder::new()
            .prefix("kernjit-engine-")
            .tempdir()
            .map_err(EngineError::Scratch)?;
        let id = NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            engine = id,
            driver = %toolchain.driver().display(),
            opt = opt_level.as_flag(),
            "created execution engine"
        );
        let mut engine = Self {
            units: Vec::new(),
            pending: Vec::new(),
            names: HashSet::new(),
            toolchain,
            opt_level,
            link_args: Vec::new(),
            id,
            generation: 0,
            objects_written: 0,
            last_finalize_failed: false,
            scratch,
        };
        engine.add_module(module);
        Ok(engine)
    }

    /// Appends an argument to every subsequent link.
    pub fn add_link_arg(&mut self, arg: impl Into<OsString>) {
        self.link_args.push(arg.into());
    }

    /// Queues a module for the next finalize.
    pub fn add_module(&mut self, module: CompiledModule) {
        if !self.names.insert(module.name().clone()) {
            tracing::warn!(
                engine = self.id,
                unit = %module.name(),
                "unit name added more than once; symbols may collide"
            );
        }
        tracing::debug!(engine = self.id, unit = %module.name(), "module added");
        self.pending.push(module);
    }

    /// Links and loads every pending module.
    ///
    /// Static initializers of the new code run during loading. With nothing
    /// pending this is a no-op. On failure the pending modules are dropped
    /// and the engine reports itself unfinalized until a later batch links;
    /// units loaded by earlier finalizes stay usable.
    pub fn finalize(&mut self) -> Result<(), FinalizeError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let result = self.link_pending();
        self.last_finalize_failed = result.is_err();
        if let Err(e) = &result {
            tracing::warn!(engine = self.id, error = %e, "finalize failed; modules dropped");
        }
        result
    }

    fn link_pending(&mut self) -> Result<(), FinalizeError> {
        let pending = std::mem::take(&mut self.pending);
        let modules: Vec<UnitName> = pending.iter().map(|m| m.name().clone()).collect();

        let mut objects = Vec::with_capacity(pending.len());
        for module in &pending {
            objects.push(self.write_object(module)?);
        }

        self.generation += 1;
        let library_path = self.scratch.path().join(format!(
            "libkernjit_{}_{}.{}",
            self.id,
            self.generation,
            std::env::consts::DLL_EXTENSION
        ));
        self.link(&objects, &library_path, &modules)?;
        let library = load_library(&library_path)?;

        tracing::info!(
            engine = self.id,
            modules = modules.len(),
            library = %library_path.display(),
            "finalized modules"
        );
        self.units.push(LoadedUnit {
            library,
            path: library_path,
            modules,
        });
        Ok(())
    }

    fn write_object(&mut self, module: &CompiledModule) -> Result<PathBuf, FinalizeError> {
        let path = self.scratch.path().join(format!(
            "{:04}-{}-{}.o",
            self.objects_written,
            module.name().file_stem(),
            module.source_hash().short()
        ));
        std::fs::write(&path, module.object()).map_err(|e| FinalizeError::Io {
            path: path.clone(),
            source: e,
        })?;
        self.objects_written += 1;
        tracing::debug!(unit = %module.name(), object = %path.display(), "wrote object");
        Ok(path)
    }

    fn link(
        &self,
        objects: &[PathBuf],
        output: &Path,
        modules: &[UnitName],
    ) -> Result<(), FinalizeError> {
        let mut cmd = self.toolchain.command();
        if cfg!(target_os = "macos") {
            cmd.args(["-dynamiclib", "-undefined", "dynamic_lookup"]);
        } else {
            cmd.arg("-shared");
        }
        cmd.arg(self.opt_level.as_flag())
            .arg("-o")
            .arg(output)
            .args(objects)
            .args(["-pthread", "-lm"])
            .args(&self.link_args);

        let names = || {
            modules
                .iter()
                .map(UnitName::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let result = cmd.output().map_err(|e| FinalizeError::Link {
            modules: names(),
            output: e.to_string(),
        })?;
        if !result.status.success() {
            return Err(FinalizeError::Link {
                modules: names(),
                output: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Address of `name` in the finalized code, searching newest units first.
    pub fn symbol_address(&self, name: &str) -> Option<*const c_void> {
        self.units.iter().rev().find_map(|unit| {
            // SAFETY: the symbol is only read as an address, never called here.
            let symbol = unsafe { unit.library.get::<*const c_void>(name.as_bytes()) }.ok()?;
            let address = *symbol;
            (!address.is_null()).then_some(address)
        })
    }

    /// Looks up `name` and reinterprets it as the function pointer type `F`.
    ///
    /// Returns `None` if the symbol is missing or `F` is not pointer sized.
    ///
    /// # Safety
    ///
    /// `F` must match the symbol's real signature and calling convention, and
    /// the pointer must not be used after the engine is dropped.
    pub unsafe fn find_function<F: Copy>(&self, name: &str) -> Option<F> {
        if std::mem::size_of::<F>() != std::mem::size_of::<*const c_void>() {
            return None;
        }
        let address = self.symbol_address(name)?;
        Some(std::mem::transmute_copy::<*const c_void, F>(&address))
    }

    /// Process-unique engine identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `true` when no modules await linking and the last batch was loaded.
    pub fn is_finalized(&self) -> bool {
        self.pending.is_empty() && !self.last_finalize_failed
    }

    /// `true` when the most recent finalize dropped its batch.
    pub fn last_finalize_failed(&self) -> bool {
        self.last_finalize_failed
    }

    /// Number of modules added since the last finalize.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Shared objects loaded so far, oldest first.
    pub fn loaded_libraries(&self) -> impl Iterator<Item = &Path> {
        self.units.iter().map(|u| u.path.as_path())
    }

    /// Units linked into each loaded shared object, oldest first.
    pub fn loaded_modules(&self) -> impl Iterator<Item = &[UnitName]> {
        self.units.iter().map(|u| u.modules.as_slice())
    }
}

impl Drop for ExecutionEngine {
    fn drop(&mut self) {
        // Later units may resolve symbols from earlier ones.
        while let Some(unit) = self.units.pop() {
            tracing::debug!(engine = self.id, library = %unit.path.display(), "unloading");
            drop(unit.library);
        }
    }
}

#[cfg(unix)]
fn load_library(path: &Path) -> Result<libloading::Library, FinalizeError> {
    use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};
    // SAFETY: the library was just linked from modules of this session;
    // running its initializers is the point of finalizing.
    let library = unsafe { Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map_err(|e| {
        FinalizeError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    Ok(library.into())
}

#[cfg(not(unix))]
fn load_library(path: &Path) -> Result<libloading::Library, FinalizeError> {
    Err(FinalizeError::Load {
        path: path.to_path_buf(),
        reason: format!("unsupported platform: {}", std::env::consts::OS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::CompilerFamily;

    fn module(name: &str) -> CompiledModule {
        CompiledModule::new(UnitName::new(name).unwrap(), "", Vec::new())
    }

    fn fake_toolchain() -> Toolchain {
        Toolchain::from_parts("/nonexistent/kernjit-c++", CompilerFamily::Clang)
    }

    #[test]
    fn opt_level_flags() {
        assert_eq!(EngineOptLevel::None.as_flag(), "-O0");
        assert_eq!(EngineOptLevel::Aggressive.as_flag(), "-O3");
        assert_eq!(EngineOptLevel::default(), EngineOptLevel::Default);
    }

    #[cfg(unix)]
    #[test]
    fn engines_get_distinct_ids() {
        let a = ExecutionEngine::create(module("a.cpp"), fake_toolchain(), EngineOptLevel::None)
            .unwrap();
        let b = ExecutionEngine::create(module("b.cpp"), fake_toolchain(), EngineOptLevel::None)
            .unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!a.is_finalized());
        assert_eq!(a.pending_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn link_failure_reports_modules() {
        let mut engine =
            ExecutionEngine::create(module("a.cpp"), fake_toolchain(), EngineOptLevel::None)
                .unwrap();
        engine.add_module(module("b.cpp"));
        let err = engine.finalize().unwrap_err();
        match err {
            FinalizeError::Link { modules, .. } => assert_eq!(modules, "a.cpp, b.cpp"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.symbol_address("anything").is_none());
        assert_eq!(engine.pending_count(), 0);
        assert!(engine.last_finalize_failed());
        assert!(!engine.is_finalized());
        assert_eq!(engine.loaded_modules().count(), 0);

        // Nothing pending: the failure stays visible.
        engine.finalize().unwrap();
        assert!(!engine.is_finalized());
    }

    #[cfg(unix)]
    #[test]
    fn wrong_sized_function_type_is_rejected() {
        let engine =
            ExecutionEngine::create(module("a.cpp"), fake_toolchain(), EngineOptLevel::None)
                .unwrap();
        let found = unsafe { engine.find_function::<[u8; 3]>("f") };
        assert!(found.is_none());
    }
}
