//! Violations and the aggregate validation error.

use std::fmt;

use thiserror::Error;

/// One schema/semantic error: where it was found and what is wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Fully composed location, starting at `$`.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations recorded while validating one document.
///
/// The display form is one `"<path>: <message>"` line per violation, in
/// recording order.
#[derive(Debug, Clone, Error)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Wrap a non-empty violation list.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// The recorded violations, in order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}
