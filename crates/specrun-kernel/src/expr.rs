//! String-producing expressions with deferred evaluation and cleanup.
//!
//! A command argument (or stdin source) is either a literal, a lookup in
//! the runner's own environment, or an ephemeral file materialized at
//! evaluation time. Evaluation may hand back a cleanup which the caller
//! must invoke exactly once; [`CleanupGuard`] owns that contract.

use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

/// Failure evaluating a string expression.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Environment-variable lookups fail when the variable is undefined.
    #[error("environment variable \"{0}\" is not defined")]
    UndefinedEnvVar(String),
    /// The ephemeral file could not be created or written.
    #[error("failed to materialize temp file: {0}")]
    TempFile(#[from] io::Error),
}

/// Cleanup handed back by an evaluation; invoked exactly once.
pub type Cleanup = Box<dyn FnOnce() -> io::Result<()> + Send>;

/// A deferred string-producing expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringExpr {
    /// A fixed string.
    Literal(String),
    /// The value of an environment variable of the runner process.
    EnvVar(String),
    /// Contents written to a fresh temp file; evaluates to its path.
    TempFile {
        /// File contents, already serialized.
        text: String,
        /// File extension, dot included (".yaml" or ".txt").
        extension: &'static str,
    },
}

impl StringExpr {
    /// Evaluate to a concrete string plus an optional cleanup.
    ///
    /// The temp-file variant writes its contents to a new file and
    /// returns the path; the cleanup removes that file.
    pub fn eval(&self) -> Result<(String, Option<Cleanup>), EvalError> {
        match self {
            StringExpr::Literal(s) => Ok((s.clone(), None)),
            StringExpr::EnvVar(name) => match std::env::var(name) {
                Ok(value) => Ok((value, None)),
                Err(_) => Err(EvalError::UndefinedEnvVar(name.clone())),
            },
            StringExpr::TempFile { text, extension } => {
                let mut file = tempfile::Builder::new()
                    .prefix("specrun-")
                    .suffix(extension)
                    .tempfile()?;
                file.as_file_mut().write_all(text.as_bytes())?;
                let (_, path) = file.keep().map_err(|e| EvalError::TempFile(e.error))?;
                let display = path.to_string_lossy().into_owned();
                let cleanup: Cleanup = Box::new(move || std::fs::remove_file(&path));
                Ok((display, Some(cleanup)))
            }
        }
    }
}

/// Human-readable, non-evaluating form, used for default test naming.
impl fmt::Display for StringExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringExpr::Literal(s) => write!(f, "{s}"),
            StringExpr::EnvVar(name) => write!(f, "${name}"),
            StringExpr::TempFile { .. } => write!(f, "<tempfile>"),
        }
    }
}

/// Owns the cleanups returned by evaluations.
///
/// `run` invokes each exactly once, collecting (not short-circuiting)
/// the errors. Dropping the guard without calling `run` still invokes
/// anything left, so no temp file outlives its test.
#[derive(Default)]
pub struct CleanupGuard {
    cleanups: Vec<Cleanup>,
}

impl CleanupGuard {
    /// An empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of one more cleanup.
    pub fn push(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    /// Invoke every owned cleanup, collecting the errors.
    pub fn run(mut self) -> Vec<io::Error> {
        self.cleanups
            .drain(..)
            .filter_map(|cleanup| cleanup().err())
            .collect()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        for cleanup in self.cleanups.drain(..) {
            let _ = cleanup();
        }
    }
}

impl fmt::Debug for CleanupGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupGuard")
            .field("pending", &self.cleanups.len())
            .finish()
    }
}

/// Evaluate expressions in declared order, stopping at the first failure.
///
/// Returns the evaluated values (or the failing index and error) together
/// with a guard owning every cleanup returned so far. Callers must let
/// the guard run in both outcomes.
pub fn eval_string_exprs(
    exprs: &[StringExpr],
) -> (Result<Vec<String>, (usize, EvalError)>, CleanupGuard) {
    let mut guard = CleanupGuard::new();
    let mut values = Vec::with_capacity(exprs.len());
    for (i, expr) in exprs.iter().enumerate() {
        match expr.eval() {
            Ok((value, cleanup)) => {
                if let Some(cleanup) = cleanup {
                    guard.push(cleanup);
                }
                values.push(value);
            }
            Err(e) => return (Err((i, e)), guard),
        }
    }
    (Ok(values), guard)
}
