//! User-facing output for pipeline steps.
//!
//! Reporter output is the product surface the operator sees. It is separate
//! from tracing, which is developer diagnostics controlled by `RUST_LOG`.

use std::io::Write;

pub trait Reporter {
    /// Informational notice.
    fn say(&self, message: &str);
    /// Failure notice.
    fn error(&self, message: &str);
}

/// Writes notices to stdout and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn say(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not fail the build.
        let _ = writeln!(out, "==> {message}");
    }

    fn error(&self, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "==> {message}");
    }
}
