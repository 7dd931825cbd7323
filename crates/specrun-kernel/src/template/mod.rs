//! Deferred variable substitution over the generic value model.
//!
//! Variable placeholders (`{"$": "<name>"}` nodes) are discovered once,
//! while a document is validated, and recorded as paths into the raw
//! value. Expanding against an [`Env`] deep-copies the raw value and
//! patches each recorded location, so the same template can be expanded
//! repeatedly with different bindings without re-walking the document.

mod env;

use specrun_types::Value;
use thiserror::Error;

use crate::validator::{ValidationError, Validator};

pub use env::Env;

/// One path from the root of a raw value to a variable placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// Leaf: replace this location with the variable's value.
    Var(String),
    /// Descend into a map field, then apply the rest of the chain.
    Field(String, Box<TemplateRef>),
    /// Descend into a sequence element, then apply the rest of the chain.
    Index(usize, Box<TemplateRef>),
}

/// Failure while expanding a template.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// A placeholder referenced a variable missing from the environment.
    #[error("variable \"{0}\" is not defined")]
    UndefinedVariable(String),
    /// A ref chain expected a container the value no longer is.
    #[error("template reference expects {expected}, but found {found}")]
    StructureMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A ref chain pointed at a field or index that no longer exists.
    #[error("template reference location {at} does not exist")]
    MissingLocation { at: String },
    /// The expanded value could not be coerced to the expected type.
    #[error("{0}")]
    Coerce(String),
    /// The expanded value failed re-validation (matcher or expression
    /// parsing after substitution).
    #[error("{0}")]
    Invalid(#[from] ValidationError),
    /// The expanded value could not be serialized.
    #[error("cannot serialize value as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A raw value paired with the placeholder paths found inside it.
#[derive(Debug, Clone)]
pub struct TemplateValue {
    raw: Value,
    refs: Vec<TemplateRef>,
}

impl TemplateValue {
    /// Scan a raw value for placeholders and record their paths.
    pub fn new(raw: Value) -> Self {
        let refs = collect_refs(&raw);
        Self { raw, refs }
    }

    /// The stored raw value.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The discovered placeholder paths.
    pub fn refs(&self) -> &[TemplateRef] {
        &self.refs
    }

    /// True when the raw value contains at least one placeholder.
    pub fn has_refs(&self) -> bool {
        !self.refs.is_empty()
    }

    /// Resolve every placeholder against `env` on a deep copy of the raw
    /// value. The stored original is never mutated, so the template can
    /// be expanded again with different bindings.
    pub fn expand(&self, env: &Env) -> Result<Value, ExpandError> {
        let mut copy = self.raw.clone();
        for template_ref in &self.refs {
            apply_ref(&mut copy, template_ref, env)?;
        }
        Ok(copy)
    }
}

/// Either a literal (no placeholders found) or a template to expand and
/// coerce at run time.
#[derive(Debug, Clone)]
pub enum Templatable<T> {
    /// Fast path: the value held no placeholders and was coerced during
    /// validation.
    Literal(T),
    /// Deferred: expanded and coerced per environment.
    Template(TemplateValue),
}

impl<T: Clone> Templatable<T> {
    /// Expand with an explicit coercion for the template branch.
    pub fn expand_with(
        &self,
        env: &Env,
        coerce: impl FnOnce(&Value) -> Result<T, ExpandError>,
    ) -> Result<T, ExpandError> {
        match self {
            Templatable::Literal(value) => Ok(value.clone()),
            Templatable::Template(template) => coerce(&template.expand(env)?),
        }
    }
}

impl<T: FromValue + Clone> Templatable<T> {
    /// Expand, coercing the template branch via [`FromValue`].
    pub fn expand(&self, env: &Env) -> Result<T, ExpandError> {
        self.expand_with(env, T::from_value)
    }
}

/// Coercion from an expanded value into a concrete field type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ExpandError>;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ExpandError> {
        value.as_str().map(str::to_string).ok_or_else(|| {
            ExpandError::Coerce(format!("should be string, but is {}", value.type_name()))
        })
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, ExpandError> {
        value.as_int().ok_or_else(|| {
            ExpandError::Coerce(format!("should be int, but is {}", value.type_name()))
        })
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ExpandError> {
        value.as_bool().ok_or_else(|| {
            ExpandError::Coerce(format!("should be bool, but is {}", value.type_name()))
        })
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ExpandError> {
        Ok(value.clone())
    }
}

/// Intermediate path step used while scanning.
enum Step {
    Field(String),
    Index(usize),
}

/// Recursively scan a raw value for `{"$": name}` nodes, recording the
/// path taken to reach each one.
fn collect_refs(value: &Value) -> Vec<TemplateRef> {
    let mut refs = Vec::new();
    let mut steps = Vec::new();
    scan(value, &mut steps, &mut refs);
    refs
}

fn scan(value: &Value, steps: &mut Vec<Step>, out: &mut Vec<TemplateRef>) {
    if let Some(name) = Validator::may_be_variable(value) {
        out.push(wrap_steps(steps, TemplateRef::Var(name.to_string())));
        return;
    }
    match value {
        Value::Seq(items) => {
            for (i, item) in items.iter().enumerate() {
                steps.push(Step::Index(i));
                scan(item, steps, out);
                steps.pop();
            }
        }
        Value::Map(map) => {
            // Sorted so discovery order is deterministic.
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            for key in keys {
                steps.push(Step::Field(key.clone()));
                scan(&map[key], steps, out);
                steps.pop();
            }
        }
        _ => {}
    }
}

/// Wrap a leaf ref in the path taken to reach it, innermost last.
fn wrap_steps(steps: &[Step], leaf: TemplateRef) -> TemplateRef {
    steps.iter().rev().fold(leaf, |inner, step| match step {
        Step::Field(key) => TemplateRef::Field(key.clone(), Box::new(inner)),
        Step::Index(i) => TemplateRef::Index(*i, Box::new(inner)),
    })
}

/// Descend per the ref chain and overwrite the target location.
///
/// The container checks are defensive: the value could have been
/// re-synthesized between discovery and expansion, so a mismatch is
/// reported as an error value, never a panic.
fn apply_ref(target: &mut Value, template_ref: &TemplateRef, env: &Env) -> Result<(), ExpandError> {
    match template_ref {
        TemplateRef::Var(name) => {
            let bound = env
                .lookup(name)
                .ok_or_else(|| ExpandError::UndefinedVariable(name.clone()))?
                .clone();
            *target = expand_value(bound, env)?;
            Ok(())
        }
        TemplateRef::Field(key, next) => match target {
            Value::Map(map) => {
                let slot = map.get_mut(key).ok_or_else(|| ExpandError::MissingLocation {
                    at: format!(".{key}"),
                })?;
                apply_ref(slot, next, env)
            }
            other => Err(ExpandError::StructureMismatch {
                expected: "map",
                found: other.type_name(),
            }),
        },
        TemplateRef::Index(i, next) => match target {
            Value::Seq(items) => {
                let slot = items.get_mut(*i).ok_or_else(|| ExpandError::MissingLocation {
                    at: format!("[{i}]"),
                })?;
                apply_ref(slot, next, env)
            }
            other => Err(ExpandError::StructureMismatch {
                expected: "seq",
                found: other.type_name(),
            }),
        },
    }
}

/// Re-expand a substituted value that may itself contain placeholders.
fn expand_value(value: Value, env: &Env) -> Result<Value, ExpandError> {
    let template = TemplateValue::new(value);
    if template.has_refs() {
        template.expand(env)
    } else {
        Ok(template.raw)
    }
}
