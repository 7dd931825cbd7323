//! Path-tracking schema validation over the generic value model.
//!
//! The validator walks an untyped document tree and extracts typed fields
//! while accumulating *all* violations, never stopping at the first. Each
//! extraction helper returns `None` on mismatch after recording a
//! violation; callers skip dependent work but keep validating siblings so
//! a single pass surfaces every independent problem.

mod violation;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use specrun_types::Value;

pub use violation::{ValidationError, Violation};

/// Schema validator with a path stack and a violation list.
#[derive(Debug)]
pub struct Validator {
    /// Name of the document being validated (for callers and reports).
    filename: String,
    /// Directory containing the document; tests run with this as their
    /// working directory and relative paths resolve against it.
    base_dir: PathBuf,
    /// Current location as a stack of suffixes, `$` at the bottom.
    path: Vec<String>,
    /// Violations in recording order.
    violations: Vec<Violation>,
    /// When set, unknown map keys are violations.
    strict: bool,
}

impl Validator {
    /// Create a validator for a document, rooted at `$`.
    pub fn new(filename: impl Into<String>, strict: bool) -> Self {
        let filename = filename.into();
        let base_dir = Path::new(&filename)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self {
            filename,
            base_dir,
            path: vec!["$".to_string()],
            violations: Vec::new(),
            strict,
        }
    }

    /// Create a validator rooted below `$`, for re-validating a fragment
    /// whose location in the original document is already known.
    pub fn scoped(filename: impl Into<String>, strict: bool, path: impl Into<String>) -> Self {
        let mut v = Self::new(filename, strict);
        v.path = vec![path.into()];
        v
    }

    /// Name of the document being validated.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Directory of the document being validated.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Whether unknown map keys are violations.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The fully composed current path.
    pub fn current_path(&self) -> String {
        self.path.concat()
    }

    /// Record a violation at the current path.
    pub fn add_violation(&mut self, message: impl Into<String>) {
        self.violations.push(Violation {
            path: self.current_path(),
            message: message.into(),
        });
    }

    /// Run `f` with `suffix` pushed onto the path, popping afterwards.
    ///
    /// The pop runs on every non-unwinding exit path; sibling validations
    /// never observe a stale path.
    pub fn in_path<T>(&mut self, suffix: impl Into<String>, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(suffix.into());
        let result = f(self);
        self.path.pop();
        result
    }

    /// Run `f` under the path suffix `.name`.
    pub fn in_field<T>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.in_path(format!(".{name}"), f)
    }

    /// Run `f` under the path suffix `[index]`.
    pub fn in_index<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        self.in_path(format!("[{index}]"), f)
    }

    fn type_violation(&mut self, expected: &str, actual: &Value) {
        self.add_violation(format!(
            "should be {expected}, but is {}",
            actual.type_name()
        ));
    }

    /// Require a map.
    pub fn must_be_map<'a>(&mut self, value: &'a Value) -> Option<&'a HashMap<String, Value>> {
        match value.as_map() {
            Some(m) => Some(m),
            None => {
                self.type_violation("map", value);
                None
            }
        }
    }

    /// Require a sequence.
    pub fn must_be_seq<'a>(&mut self, value: &'a Value) -> Option<&'a [Value]> {
        match value.as_seq() {
            Some(items) => Some(items),
            None => {
                self.type_violation("seq", value);
                None
            }
        }
    }

    /// Require a string.
    pub fn must_be_string(&mut self, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.type_violation("string", value);
                None
            }
        }
    }

    /// Require an integer.
    pub fn must_be_int(&mut self, value: &Value) -> Option<i64> {
        match value.as_int() {
            Some(i) => Some(i),
            None => {
                self.type_violation("int", value);
                None
            }
        }
    }

    /// Require a boolean.
    pub fn must_be_bool(&mut self, value: &Value) -> Option<bool> {
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.type_violation("bool", value);
                None
            }
        }
    }

    /// Require a duration: a bare non-negative integer (seconds) or a
    /// duration string such as `"3s"` or `"500ms"`.
    pub fn must_be_duration(&mut self, value: &Value) -> Option<Duration> {
        match value {
            Value::Int(i) => {
                if *i < 0 {
                    self.add_violation(format!("duration should not be negative, but is {i}"));
                    None
                } else {
                    Some(Duration::from_secs(*i as u64))
                }
            }
            Value::String(s) => match parse_duration(s) {
                Some(d) => Some(d),
                None => {
                    self.add_violation(format!("cannot parse {s:?} as duration"));
                    None
                }
            },
            other => {
                self.type_violation("duration", other);
                None
            }
        }
    }

    fn may_have_with<T>(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
        f: impl FnOnce(&mut Self, &Value) -> Option<T>,
    ) -> Option<Option<T>> {
        match map.get(key) {
            None => Some(None),
            Some(value) => self.in_field(key, |v| f(v, value)).map(Some),
        }
    }

    fn must_have_with<T>(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
        f: impl FnOnce(&mut Self, &Value) -> Option<T>,
    ) -> Option<T> {
        match map.get(key) {
            None => {
                self.add_violation(format!("should have .{key}"));
                None
            }
            Some(value) => self.in_field(key, |v| f(v, value)),
        }
    }

    /// Required raw value; records a violation when absent.
    pub fn must_have<'a>(
        &mut self,
        map: &'a HashMap<String, Value>,
        key: &str,
    ) -> Option<&'a Value> {
        match map.get(key) {
            Some(value) => Some(value),
            None => {
                self.add_violation(format!("should have .{key}"));
                None
            }
        }
    }

    /// Optional string field. `Some(None)` when absent, `None` on a
    /// recorded type violation.
    pub fn may_have_string(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
    ) -> Option<Option<String>> {
        self.may_have_with(map, key, Self::must_be_string)
    }

    /// Required string field.
    pub fn must_have_string(&mut self, map: &HashMap<String, Value>, key: &str) -> Option<String> {
        self.must_have_with(map, key, Self::must_be_string)
    }

    /// Optional integer field.
    pub fn may_have_int(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
    ) -> Option<Option<i64>> {
        self.may_have_with(map, key, Self::must_be_int)
    }

    /// Optional boolean field.
    pub fn may_have_bool(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
    ) -> Option<Option<bool>> {
        self.may_have_with(map, key, Self::must_be_bool)
    }

    /// Optional duration field.
    pub fn may_have_duration(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
    ) -> Option<Option<Duration>> {
        self.may_have_with(map, key, Self::must_be_duration)
    }

    /// Required sequence field; the callback validates the elements.
    pub fn must_have_seq<T>(
        &mut self,
        map: &HashMap<String, Value>,
        key: &str,
        f: impl FnOnce(&mut Self, &[Value]) -> Option<T>,
    ) -> Option<T> {
        self.must_have_with(map, key, |v, value| {
            let items = v.must_be_seq(value)?;
            f(v, items)
        })
    }

    /// In strict mode, flag every map key outside the allow-list.
    ///
    /// Keys are visited in sorted order so violation order is
    /// deterministic. A no-op in non-strict mode.
    pub fn must_contain_only(&mut self, map: &HashMap<String, Value>, allowed: &[&str]) -> bool {
        if !self.strict {
            return true;
        }
        let mut keys: Vec<_> = map.keys().collect();
        keys.sort();
        let mut ok = true;
        for key in keys {
            if !allowed.contains(&key.as_str()) {
                self.add_violation(format!("field .{key} is not expected"));
                ok = false;
            }
        }
        ok
    }

    /// Recognize a variable reference: a one-entry map `{"$": "<name>"}`
    /// whose name is an identifier. Anything else is not a variable.
    pub fn may_be_variable(value: &Value) -> Option<&str> {
        let map = value.as_map()?;
        if map.len() != 1 {
            return None;
        }
        let name = map.get("$")?.as_str()?;
        is_identifier(name).then_some(name)
    }

    /// All violations recorded so far.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The aggregate error, or `None` when the document is clean.
    pub fn error(&self) -> Option<ValidationError> {
        if self.violations.is_empty() {
            None
        } else {
            Some(ValidationError::new(self.violations.clone()))
        }
    }
}

/// Check the `^[A-Za-z_]\w*$` identifier shape.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a duration string with a unit suffix (ms, s, m, h).
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (number, millis_per_unit) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1_000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1_000)
    };
    let n: u64 = number.trim().parse().ok()?;
    Some(Duration::from_millis(n * millis_per_unit))
}
