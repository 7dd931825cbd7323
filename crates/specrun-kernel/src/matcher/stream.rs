//! Built-in matchers over an output stream (stdout or stderr).

use async_trait::async_trait;
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use specrun_types::Value;

use crate::exec::{self, ExecRequest, ProcessStatus};
use crate::expr::{StringExpr, eval_string_exprs};
use crate::parser::parse_string_expr;
use crate::validator::{Validator, is_identifier};

use super::{BoxMatcher, Match, MatchError, Matcher, MatcherRegistry, RegistryError};

/// Default deadline for `satisfy` helper commands.
const SATISFY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// The stream registry with every built-in registered.
pub fn stream_registry() -> Result<MatcherRegistry<[u8]>, RegistryError> {
    let mut registry = MatcherRegistry::new("stream");
    registry.add("eq", parse_eq)?;
    registry.add_with_default("beEmpty", parse_be_empty, Value::Bool(true))?;
    registry.add("contain", parse_contain)?;
    registry.add("eqJSON", parse_eq_json)?;
    registry.add("matchRegexp", parse_match_regexp)?;
    registry.add("not", parse_not)?;
    registry.add("any", parse_any)?;
    registry.add("satisfy", parse_satisfy)?;
    Ok(registry)
}

/// Exact byte equality, with a line diff on multiline mismatches.
struct EqMatcher {
    expected: String,
}

#[async_trait]
impl Matcher<[u8]> for EqMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        if actual == self.expected.as_bytes() {
            return Ok(Match::new(
                true,
                format!("stream should not be {:?}", self.expected),
            ));
        }
        let actual_text = String::from_utf8_lossy(actual);
        let mut message = format!(
            "stream should be {:?}, but is {:?}",
            self.expected, actual_text
        );
        if self.expected.contains('\n') || actual_text.contains('\n') {
            message.push_str("\ndiff:\n");
            message.push_str(&render_diff(&self.expected, &actual_text));
        }
        Ok(Match::new(false, message))
    }
}

fn render_diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        out.push_str(sign);
        out.push_str(change.value());
        if !change.value().ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn parse_eq(
    _registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let expected = v.must_be_string(param)?;
    Some(Box::new(EqMatcher { expected }))
}

/// Zero-length check.
struct BeEmptyMatcher {
    expected: bool,
}

#[async_trait]
impl Matcher<[u8]> for BeEmptyMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let empty = actual.is_empty();
        let message = if empty {
            "stream should not be empty, but is".to_string()
        } else {
            format!("stream should be empty, but has {} bytes", actual.len())
        };
        Ok(Match::new(empty == self.expected, message))
    }
}

fn parse_be_empty(
    _registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let expected = v.must_be_bool(param)?;
    Some(Box::new(BeEmptyMatcher { expected }))
}

/// Substring containment.
struct ContainMatcher {
    expected: String,
}

#[async_trait]
impl Matcher<[u8]> for ContainMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let needle = self.expected.as_bytes();
        let found = needle.is_empty() || actual.windows(needle.len()).any(|w| w == needle);
        Ok(if found {
            Match::new(
                true,
                format!("stream should not contain {:?}, but does", self.expected),
            )
        } else {
            Match::new(
                false,
                format!(
                    "stream should contain {:?}, but is {:?}",
                    self.expected,
                    String::from_utf8_lossy(actual)
                ),
            )
        })
    }
}

fn parse_contain(
    _registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let expected = v.must_be_string(param)?;
    Some(Box::new(ContainMatcher { expected }))
}

/// Deep JSON equality with normalized numbers.
struct EqJsonMatcher {
    expected: serde_json::Value,
    source: String,
}

#[async_trait]
impl Matcher<[u8]> for EqJsonMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let actual_text = String::from_utf8_lossy(actual);
        // Unparsable actual output is a plain mismatch, not a fault.
        let actual_json: serde_json::Value = match serde_json::from_str(&actual_text) {
            Ok(json) => json,
            Err(e) => {
                return Ok(Match::new(
                    false,
                    format!(
                        "stream should be JSON equal to {}, but is not valid JSON: {e}",
                        self.source
                    ),
                ));
            }
        };
        Ok(
            if normalize_numbers(&actual_json) == normalize_numbers(&self.expected) {
                Match::new(
                    true,
                    format!("stream should not be JSON equal to {}", self.source),
                )
            } else {
                Match::new(
                    false,
                    format!(
                        "stream should be JSON equal to {}, but is {actual_json}",
                        self.source
                    ),
                )
            },
        )
    }
}

/// Re-encode every number as f64 so `1` and `1.0` compare equal.
fn normalize_numbers(json: &serde_json::Value) -> serde_json::Value {
    match json {
        serde_json::Value::Number(n) => n
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(normalize_numbers).collect())
        }
        serde_json::Value::Object(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize_numbers(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn parse_eq_json(
    _registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let source = v.must_be_string(param)?;
    match serde_json::from_str(&source) {
        Ok(expected) => Some(Box::new(EqJsonMatcher { expected, source })),
        Err(e) => {
            v.add_violation(format!("cannot parse parameter as JSON: {e}"));
            None
        }
    }
}

/// Regular expression search, compiled once at parse time.
struct MatchRegexpMatcher {
    pattern: Regex,
}

#[async_trait]
impl Matcher<[u8]> for MatchRegexpMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let actual_text = String::from_utf8_lossy(actual);
        Ok(if self.pattern.is_match(&actual_text) {
            Match::new(
                true,
                format!("stream should not match /{}/, but does", self.pattern),
            )
        } else {
            Match::new(
                false,
                format!(
                    "stream should match /{}/, but is {:?}",
                    self.pattern, actual_text
                ),
            )
        })
    }
}

fn parse_match_regexp(
    _registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let source = v.must_be_string(param)?;
    match Regex::new(&source) {
        Ok(pattern) => Some(Box::new(MatchRegexpMatcher { pattern })),
        Err(e) => {
            v.add_violation(format!("cannot compile regular expression: {e}"));
            None
        }
    }
}

/// Logical negation of an inner matcher.
struct NotMatcher {
    inner: BoxMatcher<[u8]>,
}

#[async_trait]
impl Matcher<[u8]> for NotMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let inner = self.inner.matches(actual).await?;
        Ok(Match::new(!inner.matched, inner.message))
    }
}

fn parse_not(
    registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let inner = registry.parse_matcher(v, param)?;
    Some(Box::new(NotMatcher { inner }))
}

/// Disjunction: matches when any inner matcher matches.
struct AnyMatcher {
    inners: Vec<BoxMatcher<[u8]>>,
}

#[async_trait]
impl Matcher<[u8]> for AnyMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let mut matched = false;
        let mut messages = Vec::with_capacity(self.inners.len());
        for inner in &self.inners {
            let result = inner.matches(actual).await?;
            matched = matched || result.matched;
            messages.push(format!("[{}]", result.message));
        }
        Ok(Match::new(matched, messages.join(", ")))
    }
}

fn parse_any(
    registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let inners = registry.parse_matchers(v, param)?;
    Some(Box::new(AnyMatcher { inners }))
}

/// Pipes the stream into a helper command and reports on its status.
///
/// The polarity is inverted relative to the other matchers: `matched`
/// is true when the helper command *failed* (non-zero exit, signal or
/// timeout). Combine with `not` to assert that the helper succeeds.
struct SatisfyMatcher {
    command: Vec<StringExpr>,
    env: Vec<(String, String)>,
    timeout: std::time::Duration,
}

#[async_trait]
impl Matcher<[u8]> for SatisfyMatcher {
    async fn matches(&self, actual: &[u8]) -> Result<Match, MatchError> {
        let (values, guard) = eval_string_exprs(&self.command);
        let argv = match values {
            Ok(argv) => argv,
            Err((_, e)) => {
                drop(guard);
                return Err(MatchError::Eval(e));
            }
        };

        let mut req = ExecRequest::new(argv, self.timeout);
        req.stdin = actual.to_vec();
        req.env = self.env.clone();
        let result = exec::execute(&req).await;
        for e in guard.run() {
            tracing::warn!("cleanup failed: {e}");
        }

        Ok(match result?.status {
            ProcessStatus::Exited(0) => Match::new(false, "satisfy command exited successfully"),
            ProcessStatus::Exited(code) => Match::new(
                true,
                format!("satisfy command failed with status {code}"),
            ),
            ProcessStatus::Signaled(signal) => Match::new(
                true,
                format!("satisfy command was signaled ({signal})"),
            ),
            ProcessStatus::TimedOut => Match::new(true, "satisfy command was timeout"),
        })
    }
}

fn parse_satisfy(
    _registry: &MatcherRegistry<[u8]>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<[u8]>> {
    let map = v.must_be_map(param)?;

    let command = v.must_have_seq(map, "command", |v, items| {
        if items.is_empty() {
            v.add_violation("should not be empty");
            return None;
        }
        let mut exprs = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match v.in_index(i, |v| parse_string_expr(v, item)) {
                Some(expr) => exprs.push(expr),
                None => ok = false,
            }
        }
        ok.then_some(exprs)
    });

    let env = match map.get("env") {
        None => Some(Vec::new()),
        Some(value) => v.in_field("env", |v| parse_env_pairs(v, value)),
    };

    let timeout = v.may_have_duration(map, "timeout");
    v.must_contain_only(map, &["command", "env", "timeout"]);

    let matcher = SatisfyMatcher {
        command: command?,
        env: env?,
        timeout: timeout?.unwrap_or(SATISFY_TIMEOUT),
    };
    Some(Box::new(matcher))
}

/// Parse a sequence of `{name, value}` string pairs.
fn parse_env_pairs(v: &mut Validator, value: &Value) -> Option<Vec<(String, String)>> {
    let items = v.must_be_seq(value)?;
    let mut pairs = Vec::with_capacity(items.len());
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        let parsed = v.in_index(i, |v| {
            let map = v.must_be_map(item)?;
            let name = v.must_have_string(map, "name").filter(|name| {
                if is_identifier(name) {
                    true
                } else {
                    v.in_field("name", |v| {
                        v.add_violation(format!("{name:?} is not a valid variable name"));
                    });
                    false
                }
            });
            let val = v.must_have_string(map, "value");
            v.must_contain_only(map, &["name", "value"]);
            Some((name?, val?))
        });
        match parsed {
            Some(pair) => pairs.push(pair),
            None => ok = false,
        }
    }
    ok.then_some(pairs)
}
