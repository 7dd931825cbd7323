//! Report formatting for test results.

use specrun_types::{Summary, TestResult};

/// Format one result as a report line (plus indented failure detail).
pub fn format_result(result: &TestResult) -> String {
    if result.is_success() {
        return format!("ok   {}", result.name);
    }
    let mut out = format!("FAIL {}", result.name);
    if let Some(error) = &result.error {
        out.push_str("\n  error: ");
        out.push_str(&indent_continuation(error));
    }
    for failure in &result.failures {
        out.push_str(&format!(
            "\n  {}: {}",
            failure.subject,
            indent_continuation(&failure.message)
        ));
    }
    out
}

/// Format the aggregate summary line.
pub fn format_summary(summary: &Summary) -> String {
    summary.to_string()
}

/// Keep multi-line messages (diffs) aligned under their label.
fn indent_continuation(message: &str) -> String {
    message.replace('\n', "\n    ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use specrun_types::AssertionFailure;

    #[test]
    fn passing_result_is_one_line() {
        assert_eq!(format_result(&TestResult::passed("echo 42")), "ok   echo 42");
    }

    #[test]
    fn failures_are_listed_under_the_test() {
        let result = TestResult::failed(
            "sleepy",
            vec![AssertionFailure::new("status", "process was timeout")],
        );
        assert_eq!(
            format_result(&result),
            "FAIL sleepy\n  status: process was timeout"
        );
    }

    #[test]
    fn errors_are_labeled_distinctly() {
        let result = TestResult::errored("broken", "failed to spawn \"nope\"");
        assert_eq!(
            format_result(&result),
            "FAIL broken\n  error: failed to spawn \"nope\""
        );
    }

    #[test]
    fn multiline_messages_stay_indented() {
        let result = TestResult::failed(
            "diffy",
            vec![AssertionFailure::new("stdout", "mismatch\ndiff:\n-a\n+b")],
        );
        let formatted = format_result(&result);
        for line in formatted.lines().skip(1) {
            assert!(line.starts_with("  "), "unindented line: {line:?}");
        }
    }

    #[test]
    fn summary_line() {
        let summary = Summary {
            total: 2,
            succeeded: 1,
            failed: 1,
        };
        assert_eq!(format_summary(&summary), "2 tests, 1 succeeded, 1 failed");
    }
}
