//! Spec document parsing: a decoded value tree to test templates.
//!
//! The document schema is enforced with the validator primitives so
//! every structural problem in a document is reported in one pass.

use std::time::Duration;

use specrun_types::{Value, value_to_json};

use crate::expr::StringExpr;
use crate::template::{Templatable, TemplateValue};
use crate::test::{EnvVarTemplate, StdinTemplate, TestTemplate};
use crate::validator::{Validator, is_identifier};

/// The only supported document format version.
pub const SPEC_VERSION: &str = "v0";

/// Deadline applied when a test does not set `timeout`.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TOP_LEVEL_KEYS: &[&str] = &["spexec", "tests"];
const TEST_KEYS: &[&str] = &[
    "name",
    "command",
    "stdin",
    "env",
    "expect",
    "timeout",
    "teeStdout",
    "teeStderr",
];
const EXPECT_KEYS: &[&str] = &["status", "stdout", "stderr"];

/// Parse a whole document into test templates.
///
/// Returns `None` when any test failed to parse; violations for every
/// test are recorded on the validator first, so nothing is hidden by an
/// early failure.
pub fn parse_spec(v: &mut Validator, document: &Value) -> Option<Vec<TestTemplate>> {
    let map = v.must_be_map(document)?;

    if let Some(Some(version)) = v.may_have_string(map, "spexec")
        && version != SPEC_VERSION
    {
        v.in_field("spexec", |v| {
            v.add_violation(format!("should be {SPEC_VERSION:?}, but is {version:?}"));
        });
    }

    let templates = v.must_have_seq(map, "tests", |v, items| {
        let mut templates = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match v.in_index(i, |v| parse_test(v, item)) {
                Some(template) => templates.push(template),
                None => ok = false,
            }
        }
        ok.then_some(templates)
    });

    v.must_contain_only(map, TOP_LEVEL_KEYS);
    templates
}

/// Parse one test map into a template.
fn parse_test(v: &mut Validator, value: &Value) -> Option<TestTemplate> {
    let map = v.must_be_map(value)?;
    let mut ok = true;

    let name = match map.get("name") {
        None => None,
        Some(value) => {
            let parsed = v.in_field("name", |v| templatable_string(v, value));
            ok = ok && parsed.is_some();
            parsed
        }
    };

    let command = v.must_have_seq(map, "command", |v, items| {
        if items.is_empty() {
            v.add_violation("should not be empty");
            return None;
        }
        let mut exprs = Vec::with_capacity(items.len());
        let mut all = true;
        for (i, item) in items.iter().enumerate() {
            match v.in_index(i, |v| templatable_string_expr(v, item)) {
                Some(expr) => exprs.push(expr),
                None => all = false,
            }
        }
        all.then_some(exprs)
    });
    ok = ok && command.is_some();

    let stdin = match map.get("stdin") {
        None => None,
        Some(value) => {
            let parsed = v.in_field("stdin", |v| parse_stdin(v, value));
            ok = ok && parsed.is_some();
            parsed
        }
    };

    let env = match map.get("env") {
        None => Some(Vec::new()),
        Some(value) => v.in_field("env", |v| parse_env(v, value)),
    };
    ok = ok && env.is_some();

    let (status_matcher, stdout_matcher, stderr_matcher) = match map.get("expect") {
        None => (None, None, None),
        Some(value) => match v.in_field("expect", |v| parse_expect(v, value)) {
            Some(matchers) => matchers,
            None => {
                ok = false;
                (None, None, None)
            }
        },
    };

    let timeout = v.may_have_duration(map, "timeout");
    ok = ok && timeout.is_some();
    let tee_stdout = v.may_have_bool(map, "teeStdout");
    ok = ok && tee_stdout.is_some();
    let tee_stderr = v.may_have_bool(map, "teeStderr");
    ok = ok && tee_stderr.is_some();

    ok = v.must_contain_only(map, TEST_KEYS) && ok;

    if !ok {
        return None;
    }
    Some(TestTemplate {
        name,
        command: command?,
        stdin,
        env: env?,
        status_matcher,
        stdout_matcher,
        stderr_matcher,
        timeout: timeout?.unwrap_or(DEFAULT_TIMEOUT),
        tee_stdout: tee_stdout?.unwrap_or(false),
        tee_stderr: tee_stderr?.unwrap_or(false),
        filename: v.filename().to_string(),
        dir: v.base_dir().to_path_buf(),
        path: v.current_path(),
        strict: v.is_strict(),
    })
}

/// Parse the `expect` map; each specifier stays an unresolved value.
type Matchers = (
    Option<Templatable<Value>>,
    Option<Templatable<Value>>,
    Option<Templatable<Value>>,
);

fn parse_expect(v: &mut Validator, value: &Value) -> Option<Matchers> {
    let map = v.must_be_map(value)?;
    let status = map.get("status").map(templatable_value);
    let stdout = map.get("stdout").map(templatable_value);
    let stderr = map.get("stderr").map(templatable_value);
    v.must_contain_only(map, EXPECT_KEYS).then_some(())?;
    Some((status, stdout, stderr))
}

/// Parse a `stdin` field: a serialized form (`{format: "yaml", value}`)
/// or a string expression.
fn parse_stdin(v: &mut Validator, value: &Value) -> Option<StdinTemplate> {
    if let Some(map) = value.as_map()
        && map.contains_key("format")
        && Validator::may_be_variable(value).is_none()
    {
        let format = v.must_have_string(map, "format");
        let payload = v.must_have(map, "value").cloned();
        v.must_contain_only(map, &["format", "value"]);
        return match format?.as_str() {
            "yaml" => Some(StdinTemplate::Yaml(templatable_value(&payload?))),
            other => {
                v.in_field("format", |v| {
                    v.add_violation(format!("should be \"yaml\", but is {other:?}"));
                });
                None
            }
        };
    }
    templatable_string_expr(v, value).map(StdinTemplate::Expr)
}

/// Parse the `env` sequence of `{name, value}` pairs.
fn parse_env(v: &mut Validator, value: &Value) -> Option<Vec<EnvVarTemplate>> {
    let items = v.must_be_seq(value)?;
    let mut vars: Vec<EnvVarTemplate> = Vec::with_capacity(items.len());
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        let parsed = v.in_index(i, |v| {
            let map = v.must_be_map(item)?;
            let name = v.must_have_string(map, "name").and_then(|name| {
                if is_identifier(&name) {
                    Some(name)
                } else {
                    v.in_field("name", |v| {
                        v.add_violation(format!("{name:?} is not a valid variable name"));
                    });
                    None
                }
            });
            let value = match map.get("value") {
                None => {
                    v.add_violation("should have .value");
                    None
                }
                Some(value) => v.in_field("value", |v| templatable_string(v, value)),
            };
            v.must_contain_only(map, &["name", "value"]);
            Some(EnvVarTemplate {
                name: name?,
                value: value?,
            })
        });
        match parsed {
            Some(var) => {
                if vars.iter().any(|existing| existing.name == var.name) {
                    v.in_index(i, |v| {
                        v.in_field("name", |v| {
                            v.add_violation(format!(
                                "environment variable {:?} is defined twice",
                                var.name
                            ));
                        });
                    });
                    ok = false;
                } else {
                    vars.push(var);
                }
            }
            None => ok = false,
        }
    }
    ok.then_some(vars)
}

/// Parse a string expression: a literal string, `{type: "env", name}`,
/// or `{type: "file", value, format?}`.
pub(crate) fn parse_string_expr(v: &mut Validator, value: &Value) -> Option<StringExpr> {
    match value {
        Value::String(s) => Some(StringExpr::Literal(s.clone())),
        Value::Map(map) => {
            let kind = v.must_have_string(map, "type")?;
            match kind.as_str() {
                "env" => {
                    let name = v.must_have_string(map, "name");
                    v.must_contain_only(map, &["type", "name"]);
                    Some(StringExpr::EnvVar(name?))
                }
                "file" => {
                    let format = v.may_have_string(map, "format");
                    let payload = v.must_have(map, "value").cloned();
                    v.must_contain_only(map, &["type", "value", "format"]);
                    match format?.as_deref() {
                        None | Some("raw") => {
                            let text = v.in_field("value", |v| v.must_be_string(&payload?))?;
                            Some(StringExpr::TempFile {
                                text,
                                extension: ".txt",
                            })
                        }
                        Some("yaml") => match serde_yaml::to_string(&value_to_json(&payload?)) {
                            Ok(text) => Some(StringExpr::TempFile {
                                text,
                                extension: ".yaml",
                            }),
                            Err(e) => {
                                v.in_field("value", |v| {
                                    v.add_violation(format!("cannot serialize value as YAML: {e}"));
                                });
                                None
                            }
                        },
                        Some(other) => {
                            v.in_field("format", |v| {
                                v.add_violation(format!(
                                    "should be \"raw\" or \"yaml\", but is {other:?}"
                                ));
                            });
                            None
                        }
                    }
                }
                other => {
                    v.in_field("type", |v| {
                        v.add_violation(format!("should be \"env\" or \"file\", but is {other:?}"));
                    });
                    None
                }
            }
        }
        other => {
            v.add_violation(format!(
                "should be string or map, but is {}",
                other.type_name()
            ));
            None
        }
    }
}

/// A templatable string: deferred when placeholders are present,
/// otherwise type-checked now.
fn templatable_string(v: &mut Validator, value: &Value) -> Option<Templatable<String>> {
    let template = TemplateValue::new(value.clone());
    if template.has_refs() {
        return Some(Templatable::Template(template));
    }
    v.must_be_string(value).map(Templatable::Literal)
}

/// A templatable string expression.
fn templatable_string_expr(v: &mut Validator, value: &Value) -> Option<Templatable<StringExpr>> {
    let template = TemplateValue::new(value.clone());
    if template.has_refs() {
        return Some(Templatable::Template(template));
    }
    parse_string_expr(v, value).map(Templatable::Literal)
}

/// A templatable raw value; always parses.
fn templatable_value(value: &Value) -> Templatable<Value> {
    let template = TemplateValue::new(value.clone());
    if template.has_refs() {
        Templatable::Template(template)
    } else {
        Templatable::Literal(value.clone())
    }
}
