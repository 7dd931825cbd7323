//! Test results and the run summary.

use std::fmt;

/// One named assertion failure within a test.
///
/// `subject` is which assertion failed ("status", "stdout" or "stderr");
/// `message` is the matcher's explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    /// Which assertion failed.
    pub subject: String,
    /// Why it failed.
    pub message: String,
}

impl AssertionFailure {
    /// Create a failure for a subject.
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// The outcome of running one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Display name of the test.
    pub name: String,
    /// Assertion failures, in assertion order (status, stdout, stderr).
    pub failures: Vec<AssertionFailure>,
    /// Internal error that aborted the test, if any. Distinct from
    /// assertion failures: this is a system fault, not a failed check.
    pub error: Option<String>,
}

impl TestResult {
    /// A passing result.
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failures: Vec::new(),
            error: None,
        }
    }

    /// A result with assertion failures.
    pub fn failed(name: impl Into<String>, failures: Vec<AssertionFailure>) -> Self {
        Self {
            name: name.into(),
            failures,
            error: None,
        }
    }

    /// A result aborted by an internal error.
    pub fn errored(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failures: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// True when every assertion matched and no internal error occurred.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.error.is_none()
    }
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    /// Tally a slice of results.
    pub fn of(results: &[TestResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tests, {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )
    }
}
