//! Just-in-time compilation of generated C++ kernels.
//!
//! An [`ExecutionState`] is one compilation session. It drives a C++ compiler
//! over in-memory source text to produce [`CompiledModule`]s, hands them to a
//! lazily created [`ExecutionEngine`], and exposes the finalized code as
//! native function pointers.
//!
//! ```ignore
//! let mut state = ExecutionState::new();
//! let module = state.compile(r#"extern "C" int add_one(int x){ return x+1; }"#, "add_one.cpp");
//! assert!(state.add_module(module));
//! state.finalize()?;
//! let add_one: extern "C" fn(i32) -> i32 = unsafe { state.find_function("add_one") }.unwrap();
//! assert_eq!(add_one(41), 42);
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod invocation;
pub mod module;
pub mod options;
pub mod resource;
pub mod state;
pub mod toolchain;

pub use engine::{EngineOptLevel, ExecutionEngine};
pub use error::{EngineError, FinalizeError, ToolchainError};
pub use invocation::Invocation;
pub use module::CompiledModule;
pub use options::{CodegenOptions, FloatAbi, LanguageOptions, RelocationModel, TargetOptions};
pub use state::ExecutionState;
pub use toolchain::{initialize_targets, CompilerFamily, Toolchain};
