//! Per-compile diagnostic accumulator.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Collects the diagnostics of one compile.
///
/// A fresh sink is created for every compile so errors never leak between
/// translation units. Error and warning tallies are atomic, so checking for
/// failure does not lock the diagnostic list.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a diagnostic. Error and fatal diagnostics fail the compile.
    pub fn emit(&self, diag: Diagnostic) {
        match diag.severity {
            s if s.is_error() => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            Severity::Warning => {
                self.warnings.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        self.list().push(diag);
    }

    /// Records every diagnostic of an iterator, in order.
    pub fn emit_all(&self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.emit(diag);
        }
    }

    /// Whether the compile has failed.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Error and fatal diagnostics recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Warnings recorded so far.
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// The most severe diagnostic level seen, if any.
    pub fn worst(&self) -> Option<Severity> {
        self.list().iter().map(|d| d.severity).max()
    }

    /// Drains the recorded diagnostics. Tallies are kept.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.list())
    }

    /// Consumes the sink, returning the diagnostics in emission order.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
