//! The compilation session.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};

use kernjit_common::UnitName;
use kernjit_config::{validate_config, ConfigError, JitConfig, OpenMpMode};
use kernjit_diagnostics::{
    parse_compiler_output, Diagnostic, DiagnosticRenderer, DiagnosticSink, TerminalRenderer,
};
use kernjit_headers::{populate, HeaderCache, HeaderLayout, SharedHeaderCache};

use crate::engine::{EngineOptLevel, ExecutionEngine};
use crate::error::{EngineError, FinalizeError, ToolchainError, NO_ENGINE_MESSAGE};
use crate::invocation::Invocation;
use crate::module::CompiledModule;
use crate::options::{CodegenOptions, LanguageOptions, TargetOptions};
use crate::resource::{builtin_include_dirs, resolve_resource_dir};
use crate::toolchain::{initialize_targets, Toolchain};

/// One compilation and execution session.
///
/// Compiles source text into [`CompiledModule`]s, owns the execution engine
/// they are added to, and exposes finalized symbols. A session is driven by
/// one owner at a time; use independent sessions for parallel compilation.
/// Dropping the session unloads all code it finalized.
pub struct ExecutionState {
    config: JitConfig,
    header_cache: SharedHeaderCache,
    toolchain: Option<Toolchain>,
    resource_dir: Option<PathBuf>,
    engine: Option<ExecutionEngine>,
    jit_error: String,
    compiles: usize,
    last_diagnostics: Vec<Diagnostic>,
    renderer: TerminalRenderer,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionState {
    /// Creates a session with the default configuration and the process-wide
    /// header cache.
    pub fn new() -> Self {
        Self::from_parts(JitConfig::default(), HeaderCache::global())
    }

    /// Creates a session from a validated configuration.
    pub fn with_config(config: JitConfig) -> Result<Self, ConfigError> {
        validate_config(&config)?;
        Ok(Self::from_parts(config, HeaderCache::global()))
    }

    fn from_parts(config: JitConfig, header_cache: SharedHeaderCache) -> Self {
        Self {
            resource_dir: config.toolchain.resource_dir.clone(),
            config,
            header_cache,
            toolchain: None,
            engine: None,
            jit_error: String::new(),
            compiles: 0,
            last_diagnostics: Vec::new(),
            renderer: TerminalRenderer::new(std::io::stderr().is_terminal()),
        }
    }

    /// Substitutes the header cache, e.g. [`HeaderCache::isolated`] in tests.
    pub fn with_header_cache(mut self, cache: SharedHeaderCache) -> Self {
        self.header_cache = cache;
        self
    }

    /// The session configuration.
    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Enables the precompiled header. Ignored once the session has compiled.
    pub fn set_precompiled_headers_enabled(&mut self, enabled: bool) {
        if self.frozen("precompiled headers") {
            return;
        }
        self.config.session.precompiled_headers = enabled;
    }

    /// Whether the precompiled header is included in every compile.
    pub fn is_precompiled_headers_enabled(&self) -> bool {
        self.config.session.precompiled_headers
    }

    /// Enables full debug info. Ignored once the session has compiled.
    pub fn set_debuginfo_enabled(&mut self, enabled: bool) {
        if self.frozen("debug info") {
            return;
        }
        self.config.session.debug_info = enabled;
    }

    /// Whether compiles emit full debug info.
    pub fn is_debuginfo_enabled(&self) -> bool {
        self.config.session.debug_info
    }

    fn frozen(&self, toggle: &str) -> bool {
        if self.compiles > 0 {
            tracing::warn!(toggle, "session toggles are fixed after the first compile");
        }
        self.compiles > 0
    }

    /// Compiles `source` as the translation unit `name`.
    ///
    /// Returns `None` on any failure, never a partial module. Diagnostics are
    /// printed to stderr and kept for [`last_diagnostics`](Self::last_diagnostics).
    pub fn compile(&mut self, source: &str, name: &str) -> Option<CompiledModule> {
        self.compiles += 1;
        let sink = DiagnosticSink::new();
        let module = self.compile_unit(source, name, &sink);
        if sink.warning_count() > 0 {
            tracing::debug!(unit = name, warnings = sink.warning_count(), "compile warnings");
        }
        let diagnostics = sink.into_diagnostics();
        if !diagnostics.is_empty() {
            eprint!("{}", self.renderer.render_all(&diagnostics));
        }
        self.last_diagnostics = diagnostics;
        module
    }

    fn compile_unit(
        &mut self,
        source: &str,
        name: &str,
        sink: &DiagnosticSink,
    ) -> Option<CompiledModule> {
        let unit = match UnitName::new(name) {
            Ok(unit) => unit,
            Err(e) => {
                sink.emit(Diagnostic::error(e.to_string()));
                return None;
            }
        };
        let toolchain = match self.toolchain() {
            Ok(toolchain) => toolchain,
            Err(e) => {
                sink.emit(Diagnostic::error(e.to_string()));
                return None;
            }
        };

        let mut invocation = Invocation::new(unit.clone(), toolchain.family());
        self.apply_header_search(&toolchain, &mut invocation);
        invocation.apply_language(&LanguageOptions::kernel_dialect(self.config.language.openmp));
        invocation.apply_codegen(&CodegenOptions::from_session(&self.config.session));
        invocation.apply_target(&TargetOptions::from(&self.config.target));

        let scratch = match tempfile::Builder::new().prefix("kernjit-unit-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                sink.emit(Diagnostic::error(format!("cannot create scratch directory: {e}")));
                return None;
            }
        };
        let object_path = scratch.path().join(format!("{}.o", unit.file_stem()));

        tracing::debug!(unit = %unit, args = invocation.args().len(), "compiling");
        let output = match invocation.execute(&toolchain, source, &object_path) {
            Ok(output) => output,
            Err(e) => {
                sink.emit(Diagnostic::error(format!(
                    "failed to run {}: {e}",
                    toolchain.driver().display()
                )));
                return None;
            }
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        sink.emit_all(parse_compiler_output(&stderr));

        if !output.status.success() || sink.has_errors() {
            if !sink.has_errors() {
                sink.emit(Diagnostic::error(format!(
                    "{} exited with {}: {}",
                    toolchain.driver().display(),
                    output.status,
                    stderr.trim()
                )));
            }
            tracing::debug!(unit = %unit, errors = sink.error_count(), "compile failed");
            return None;
        }

        let object = match std::fs::read(&object_path) {
            Ok(object) => object,
            Err(e) => {
                sink.emit(Diagnostic::error(format!(
                    "cannot read object {}: {e}",
                    object_path.display()
                )));
                return None;
            }
        };
        tracing::debug!(unit = %unit, bytes = object.len(), "compiled unit");
        Some(CompiledModule::new(unit, source, object))
    }

    fn toolchain(&mut self) -> Result<Toolchain, ToolchainError> {
        if let Some(toolchain) = &self.toolchain {
            return Ok(toolchain.clone());
        }
        let toolchain = match &self.config.toolchain.compiler {
            Some(driver) => Toolchain::detect(driver.clone())?,
            None => initialize_targets()?,
        };
        self.toolchain = Some(toolchain.clone());
        Ok(toolchain)
    }

    fn resource_dir(&mut self, toolchain: &Toolchain) -> Option<PathBuf> {
        if self.resource_dir.is_none() {
            self.resource_dir = resolve_resource_dir(toolchain);
        }
        self.resource_dir.clone()
    }

    /// Populates the header cache on first use, then re-injects its search
    /// paths into `invocation`.
    fn apply_header_search(&mut self, toolchain: &Toolchain, invocation: &mut Invocation) {
        let shared = Arc::clone(&self.header_cache);
        let mut cache = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let headers = &self.config.headers;
        let cache_files = headers.cache_files;
        let isolate = headers.isolate_system;

        if !cache.is_valid() {
            let project: Vec<PathBuf> = headers
                .eigen
                .iter()
                .chain(headers.framework.iter())
                .cloned()
                .collect();
            let user = headers.extra.clone();
            let builtin = self
                .resource_dir(toolchain)
                .map(|dir| builtin_include_dirs(&dir))
                .unwrap_or_default();
            let mut layout = HeaderLayout::host(builtin, project);
            layout.user = user;
            if let Some(report) = populate(&mut cache, &layout, cache_files) {
                tracing::info!(
                    unit = %invocation.unit(),
                    paths = report.paths,
                    files = report.files,
                    "header cache populated"
                );
            }
        }

        if cache_files {
            if let Err(e) = cache.overlay_root() {
                tracing::warn!(error = %e, "header overlay unavailable; using real paths");
            }
        }
        invocation.apply_header_search(&cache, isolate);
    }

    /// Hands a compiled module to the session's engine.
    ///
    /// The first module creates the engine. Returns `false` for `None` or
    /// when the engine cannot be created; the reason is kept and raised by
    /// [`finalize`](Self::finalize).
    pub fn add_module(&mut self, module: Option<CompiledModule>) -> bool {
        let Some(module) = module else {
            tracing::debug!("no module to add");
            return false;
        };
        if let Some(engine) = &mut self.engine {
            engine.add_module(module);
            return true;
        }
        match self.create_engine(module) {
            Ok(engine) => {
                self.engine = Some(engine);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "execution engine construction failed");
                self.jit_error = e.to_string();
                false
            }
        }
    }

    fn create_engine(&mut self, module: CompiledModule) -> Result<ExecutionEngine, EngineError> {
        let toolchain = self.toolchain()?;
        let mut engine = ExecutionEngine::create(module, toolchain, EngineOptLevel::Aggressive)?;
        if self.config.language.openmp == OpenMpMode::Full {
            engine.add_link_arg("-fopenmp");
        }
        Ok(engine)
    }

    /// Links and loads every module added since the last finalize.
    pub fn finalize(&mut self) -> Result<(), FinalizeError> {
        match &mut self.engine {
            Some(engine) => engine.finalize(),
            None => {
                let message = if self.jit_error.is_empty() {
                    NO_ENGINE_MESSAGE.to_string()
                } else {
                    self.jit_error.clone()
                };
                Err(FinalizeError::NoEngine { message })
            }
        }
    }

    /// Address of a finalized symbol, or `None`.
    pub fn symbol_address(&self, name: &str) -> Option<*const std::ffi::c_void> {
        self.engine.as_ref()?.symbol_address(name)
    }

    /// Looks up a finalized function.
    ///
    /// # Safety
    ///
    /// See [`ExecutionEngine::find_function`]. The pointer is only valid
    /// while this session is alive.
    pub unsafe fn find_function<F: Copy>(&self, name: &str) -> Option<F> {
        self.engine.as_ref()?.find_function(name)
    }

    /// Identifier of the session's engine, once one exists.
    pub fn engine_id(&self) -> Option<u64> {
        self.engine.as_ref().map(ExecutionEngine::id)
    }

    /// The session's engine, once one exists.
    pub fn engine(&self) -> Option<&ExecutionEngine> {
        self.engine.as_ref()
    }

    /// `true` when an engine exists, no modules await finalize and the last
    /// finalize loaded its batch.
    pub fn is_finalized(&self) -> bool {
        self.engine.as_ref().is_some_and(ExecutionEngine::is_finalized)
    }

    /// Diagnostics of the most recent compile.
    pub fn last_diagnostics(&self) -> &[Diagnostic] {
        &self.last_diagnostics
    }

    /// The last engine construction error, empty if none occurred.
    pub fn jit_error(&self) -> &str {
        &self.jit_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernjit_diagnostics::Severity;

    fn session() -> ExecutionState {
        ExecutionState::new().with_header_cache(HeaderCache::isolated())
    }

    #[test]
    fn finalize_without_engine_is_an_error() {
        let mut state = session();
        let err = state.finalize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error in finalize: Could not create an execution engine"
        );
    }

    #[test]
    fn add_none_fails_and_creates_no_engine() {
        let mut state = session();
        assert!(!state.add_module(None));
        assert!(state.engine_id().is_none());
        assert!(!state.is_finalized());
        assert!(matches!(state.finalize(), Err(FinalizeError::NoEngine { .. })));
    }

    #[test]
    fn invalid_unit_name_fails_compile() {
        let mut state = session();
        assert!(state.compile("int x;", "bad\nname.cpp").is_none());
        let diags = state.last_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
    }

    #[test]
    fn toggles_fixed_after_first_compile() {
        let mut state = session();
        state.set_debuginfo_enabled(true);
        assert!(state.is_debuginfo_enabled());
        let _ = state.compile("", "");
        state.set_debuginfo_enabled(false);
        state.set_precompiled_headers_enabled(true);
        assert!(state.is_debuginfo_enabled());
        assert!(!state.is_precompiled_headers_enabled());
    }

    #[test]
    fn engine_error_surfaces_at_finalize() {
        let mut config = JitConfig::default();
        config.toolchain.compiler = Some(PathBuf::from("/nonexistent/kernjit-c++"));
        let mut state = ExecutionState::with_config(config)
            .unwrap()
            .with_header_cache(HeaderCache::isolated());

        let module = CompiledModule::new(UnitName::new("k.cpp").unwrap(), "", Vec::new());
        assert!(!state.add_module(Some(module)));
        assert!(state.jit_error().contains("kernjit-c++"));

        let err = state.finalize().unwrap_err();
        match err {
            FinalizeError::NoEngine { message } => assert!(message.contains("kernjit-c++")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_compiler_fails_compile() {
        let mut config = JitConfig::default();
        config.toolchain.compiler = Some(PathBuf::from("/nonexistent/kernjit-c++"));
        let mut state = ExecutionState::with_config(config).unwrap();
        assert!(state.compile("int x;", "x.cpp").is_none());
        assert!(state.last_diagnostics()[0].severity.is_error());
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = JitConfig::default();
        config.session.opt_level = 9;
        assert!(ExecutionState::with_config(config).is_err());
    }
}
