//! Test result reporting
//!
//! The interpreter reports everything a test author cares about (log lines,
//! warnings, errors, exceptions and assertion outcomes) through a
//! [`Reporter`]. [`TracingReporter`] forwards to `tracing` and keeps counts
//! for the end-of-run summary.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sink for test output
pub trait Reporter: Send + Sync {
    fn log(&self, message: &str);

    fn warning(&self, message: &str);

    fn error(&self, message: &str);

    /// Report a failure along with its full cause chain
    fn exception(&self, message: &str, error: &(dyn StdError + 'static));

    /// Assert that `expected` appears in `haystack`
    fn assert(&self, expected: &str, haystack: &str) -> bool;

    /// Assert that `unexpected` does not appear in `haystack`
    fn assert_not(&self, unexpected: &str, haystack: &str) -> bool;
}

/// Render an error and each of its sources as `a: b: c`
pub fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Counts of what a run reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub warnings: usize,
    pub errors: usize,
    pub exceptions: usize,
    pub asserts_passed: usize,
    pub asserts_failed: usize,
}

impl Summary {
    /// Whether nothing went wrong
    pub fn passed(&self) -> bool {
        self.errors == 0 && self.exceptions == 0 && self.asserts_failed == 0
    }
}

/// Reporter that logs through `tracing`
#[derive(Debug, Default)]
pub struct TracingReporter {
    warnings: AtomicUsize,
    errors: AtomicUsize,
    exceptions: AtomicUsize,
    asserts_passed: AtomicUsize,
    asserts_failed: AtomicUsize,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            warnings: self.warnings.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
            asserts_passed: self.asserts_passed.load(Ordering::Relaxed),
            asserts_failed: self.asserts_failed.load(Ordering::Relaxed),
        }
    }

    fn record_assert(&self, passed: bool) -> bool {
        let counter = if passed {
            &self.asserts_passed
        } else {
            &self.asserts_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        passed
    }
}

impl Reporter for TracingReporter {
    fn log(&self, message: &str) {
        tracing::info!(target: "voodoo::report", "{}", message);
    }

    fn warning(&self, message: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(target: "voodoo::report", "{}", message);
    }

    fn error(&self, message: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!(target: "voodoo::report", "{}", message);
    }

    fn exception(&self, message: &str, error: &(dyn StdError + 'static)) {
        self.exceptions.fetch_add(1, Ordering::Relaxed);
        tracing::error!(target: "voodoo::report", cause = %error_chain(error), "{}", message);
    }

    fn assert(&self, expected: &str, haystack: &str) -> bool {
        let passed = haystack.contains(expected);
        if passed {
            tracing::info!(target: "voodoo::report", expected, "Assert passed");
        } else {
            tracing::error!(target: "voodoo::report", expected, "Assert failed: text not found");
        }
        self.record_assert(passed)
    }

    fn assert_not(&self, unexpected: &str, haystack: &str) -> bool {
        let passed = !haystack.contains(unexpected);
        if passed {
            tracing::info!(target: "voodoo::report", unexpected, "AssertNot passed");
        } else {
            tracing::error!(target: "voodoo::report", unexpected, "AssertNot failed: text found");
        }
        self.record_assert(passed)
    }
}
