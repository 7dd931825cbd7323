//! Built-in matchers over the process exit status.

use async_trait::async_trait;
use specrun_types::Value;

use crate::validator::Validator;

use super::{BoxMatcher, Match, MatchError, Matcher, MatcherRegistry, RegistryError};

/// The status registry with every built-in registered.
pub fn status_registry() -> Result<MatcherRegistry<i32>, RegistryError> {
    let mut registry = MatcherRegistry::new("status");
    registry.add("eq", parse_eq)?;
    registry.add_with_default("success", parse_success, Value::Bool(true))?;
    Ok(registry)
}

/// Exact exit-code equality.
struct EqMatcher {
    expected: i64,
}

#[async_trait]
impl Matcher<i32> for EqMatcher {
    async fn matches(&self, actual: &i32) -> Result<Match, MatchError> {
        let actual = i64::from(*actual);
        Ok(if actual == self.expected {
            Match::new(true, format!("status should not be {}", self.expected))
        } else {
            Match::new(
                false,
                format!("status should be {}, but is {actual}", self.expected),
            )
        })
    }
}

fn parse_eq(
    _registry: &MatcherRegistry<i32>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<i32>> {
    let expected = v.must_be_int(param)?;
    Some(Box::new(EqMatcher { expected }))
}

/// Zero/non-zero status interpreted as success or failure.
struct SuccessMatcher {
    expected: bool,
}

#[async_trait]
impl Matcher<i32> for SuccessMatcher {
    async fn matches(&self, actual: &i32) -> Result<Match, MatchError> {
        let succeeded = *actual == 0;
        let wanted = if self.expected { "success" } else { "failure" };
        Ok(if succeeded == self.expected {
            Match::new(
                true,
                format!("status should not be {wanted}, but is {actual}"),
            )
        } else {
            Match::new(false, format!("status should be {wanted}, but is {actual}"))
        })
    }
}

fn parse_success(
    _registry: &MatcherRegistry<i32>,
    v: &mut Validator,
    param: &Value,
) -> Option<BoxMatcher<i32>> {
    let expected = v.must_be_bool(param)?;
    Some(Box::new(SuccessMatcher { expected }))
}
