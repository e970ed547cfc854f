//! Compiler diagnostics: collection, parsing and rendering.
//!
//! Every compile gets a fresh [`DiagnosticSink`]. The frontend's textual
//! output is turned into structured [`Diagnostic`] values by
//! [`parse_compiler_output`], and a [`DiagnosticRenderer`] formats them for the
//! embedding process's error stream.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod location;
pub mod parse;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use diagnostic::Diagnostic;
pub use location::SourceLocation;
pub use parse::parse_compiler_output;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
