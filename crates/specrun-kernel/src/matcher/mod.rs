//! Pluggable assertion matchers.
//!
//! A matcher is a predicate over one subject type — the process exit
//! status (`i32`) or an output stream (`[u8]`) — with a human-readable
//! explanation phrased for both polarities, so negation reports read as
//! well as plain failures. Matchers are built from document specifiers by
//! a per-subject [`MatcherRegistry`]: a write-once dispatch table from
//! assertion name to parsing logic.

mod status;
mod stream;

use std::collections::HashMap;

use async_trait::async_trait;
use specrun_types::Value;
use thiserror::Error;

use crate::exec::ExecError;
use crate::expr::EvalError;
use crate::validator::Validator;

pub use status::status_registry;
pub use stream::stream_registry;

/// The outcome of one matcher application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Whether the assertion held.
    pub matched: bool,
    /// Why it failed — or, when it held, what would make its negation
    /// fail. Both directions are needed for `not` reports.
    pub message: String,
}

impl Match {
    /// Create a match outcome.
    pub fn new(matched: bool, message: impl Into<String>) -> Self {
        Self {
            matched,
            message: message.into(),
        }
    }
}

/// System fault while evaluating a matcher, distinct from a mismatch.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A predicate over one subject type.
#[async_trait]
pub trait Matcher<S: ?Sized + Sync>: Send + Sync {
    /// Apply the matcher to an observed subject.
    async fn matches(&self, actual: &S) -> Result<Match, MatchError>;
}

/// A boxed matcher over subject `S`.
pub type BoxMatcher<S> = Box<dyn Matcher<S>>;

/// Parsing logic for one registered matcher name.
///
/// Receives the registry (so composite matchers can parse inner
/// specifiers), the validator to record violations in, and the parameter
/// value. Returns `None` after recording violations on failure.
pub type MatcherParser<S> =
    fn(&MatcherRegistry<S>, &mut Validator, &Value) -> Option<BoxMatcher<S>>;

struct RegistryEntry<S: ?Sized> {
    parse: MatcherParser<S>,
    default_param: Option<Value>,
}

/// Registering a name twice is rejected; registries are write-once per
/// name.
#[derive(Debug, Error)]
#[error("matcher \"{name}\" is already registered in the {subject} registry")]
pub struct RegistryError {
    name: String,
    subject: &'static str,
}

/// Dispatch table from assertion name to parsing logic, for one subject
/// type.
pub struct MatcherRegistry<S: ?Sized> {
    subject: &'static str,
    entries: HashMap<String, RegistryEntry<S>>,
}

impl<S: ?Sized + Sync> MatcherRegistry<S> {
    /// An empty registry for a named subject ("status", "stream").
    pub fn new(subject: &'static str) -> Self {
        Self {
            subject,
            entries: HashMap::new(),
        }
    }

    /// Register a matcher that requires an explicit parameter.
    pub fn add(&mut self, name: &str, parse: MatcherParser<S>) -> Result<(), RegistryError> {
        self.insert(name, parse, None)
    }

    /// Register a matcher usable as a bare name via a default parameter.
    pub fn add_with_default(
        &mut self,
        name: &str,
        parse: MatcherParser<S>,
        default_param: Value,
    ) -> Result<(), RegistryError> {
        self.insert(name, parse, Some(default_param))
    }

    fn insert(
        &mut self,
        name: &str,
        parse: MatcherParser<S>,
        default_param: Option<Value>,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(name) {
            return Err(RegistryError {
                name: name.to_string(),
                subject: self.subject,
            });
        }
        self.entries.insert(
            name.to_string(),
            RegistryEntry {
                parse,
                default_param,
            },
        );
        Ok(())
    }

    /// Build a matcher from a specifier: a bare name (legal only with a
    /// default parameter) or a one-entry map `{name: param}`.
    pub fn parse_matcher(&self, v: &mut Validator, specifier: &Value) -> Option<BoxMatcher<S>> {
        match specifier {
            Value::String(name) => {
                let Some(entry) = self.entries.get(name) else {
                    v.add_violation(format!("matcher \"{name}\" is not defined"));
                    return None;
                };
                let parse = entry.parse;
                match entry.default_param.clone() {
                    Some(param) => v.in_field(name, |v| parse(self, v, &param)),
                    None => {
                        v.in_field(name, |v| v.add_violation("parameter is required"));
                        None
                    }
                }
            }
            Value::Map(map) => {
                if map.len() != 1 {
                    v.add_violation(format!(
                        "matcher specifier should have exactly one entry, but has {}",
                        map.len()
                    ));
                    return None;
                }
                let (name, param) = map.iter().next()?;
                let Some(entry) = self.entries.get(name) else {
                    v.add_violation(format!("matcher \"{name}\" is not defined"));
                    return None;
                };
                let parse = entry.parse;
                v.in_field(name, |v| parse(self, v, param))
            }
            other => {
                v.add_violation(format!(
                    "should be a matcher name or a map with one entry, but is {}",
                    other.type_name()
                ));
                None
            }
        }
    }

    /// Parse a sequence of specifiers.
    ///
    /// Fails the whole sequence when any element fails, but keeps parsing
    /// so every element's violations are recorded first.
    pub fn parse_matchers(&self, v: &mut Validator, value: &Value) -> Option<Vec<BoxMatcher<S>>> {
        let items = v.must_be_seq(value)?;
        let mut matchers = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match v.in_index(i, |v| self.parse_matcher(v, item)) {
                Some(matcher) => matchers.push(matcher),
                None => ok = false,
            }
        }
        ok.then_some(matchers)
    }
}

impl<S: ?Sized> std::fmt::Debug for MatcherRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("MatcherRegistry")
            .field("subject", &self.subject)
            .field("matchers", &names)
            .finish()
    }
}
