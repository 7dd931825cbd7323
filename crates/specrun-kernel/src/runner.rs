//! Test orchestration: expand templates, execute, match, report.

use specrun_types::{AssertionFailure, TestResult};

use crate::exec::{self, ExecRequest, ProcessStatus};
use crate::expr::eval_string_exprs;
use crate::matcher::MatcherRegistry;
use crate::template::Env;
use crate::test::{Test, TestStdin, TestTemplate};

/// Run one resolved test and produce its result.
///
/// Assertion failures are ordinary result data; internal faults (launch
/// failure, matcher system errors, expression evaluation failures) abort
/// this test and are surfaced through the result's error field.
#[tracing::instrument(level = "info", skip_all, fields(test = %test.name))]
pub async fn run_test(test: &Test) -> TestResult {
    let (values, mut guard) = eval_string_exprs(&test.command);
    let argv = match values {
        Ok(argv) => argv,
        Err((index, e)) => {
            release(guard);
            return TestResult::errored(
                &test.name,
                format!("failed to evaluate command[{index}]: {e}"),
            );
        }
    };

    let stdin = match &test.stdin {
        TestStdin::Bytes(bytes) => bytes.clone(),
        TestStdin::Expr(expr) => match expr.eval() {
            Ok((value, cleanup)) => {
                if let Some(cleanup) = cleanup {
                    guard.push(cleanup);
                }
                value.into_bytes()
            }
            Err(e) => {
                release(guard);
                return TestResult::errored(&test.name, format!("failed to evaluate stdin: {e}"));
            }
        },
    };

    let mut req = ExecRequest::new(argv, test.timeout);
    req.dir = Some(test.dir.clone());
    req.stdin = stdin;
    req.env = test.env.clone();
    req.tee_stdout = test.tee_stdout;
    req.tee_stderr = test.tee_stderr;

    let outcome = exec::execute(&req).await;
    release(guard);
    let output = match outcome {
        Ok(output) => output,
        Err(e) => return TestResult::errored(&test.name, e.to_string()),
    };

    let mut failures = Vec::new();
    match output.status {
        ProcessStatus::Exited(code) => {
            if let Some(matcher) = &test.status_matcher {
                match matcher.matches(&code).await {
                    Ok(m) if !m.matched => failures.push(AssertionFailure::new("status", m.message)),
                    Ok(_) => {}
                    Err(e) => return TestResult::errored(&test.name, e.to_string()),
                }
            }
        }
        ProcessStatus::Signaled(signal) => failures.push(AssertionFailure::new(
            "status",
            format!("process was signaled ({signal})"),
        )),
        ProcessStatus::TimedOut => {
            failures.push(AssertionFailure::new("status", "process was timeout"));
        }
    }

    // Stream matchers run over captured output regardless of how the
    // process terminated.
    let streams = [
        ("stdout", &test.stdout_matcher, &output.stdout),
        ("stderr", &test.stderr_matcher, &output.stderr),
    ];
    for (subject, matcher, bytes) in streams {
        if let Some(matcher) = matcher {
            match matcher.matches(bytes.as_slice()).await {
                Ok(m) if !m.matched => failures.push(AssertionFailure::new(subject, m.message)),
                Ok(_) => {}
                Err(e) => return TestResult::errored(&test.name, e.to_string()),
            }
        }
    }

    if failures.is_empty() {
        TestResult::passed(&test.name)
    } else {
        TestResult::failed(&test.name, failures)
    }
}

/// Expand and run templates sequentially, in document order.
///
/// A template whose expansion fails yields an errored result; the
/// remaining tests still run.
pub async fn run_templates(
    templates: &[TestTemplate],
    env: &Env,
    status_registry: &MatcherRegistry<i32>,
    stream_registry: &MatcherRegistry<[u8]>,
) -> Vec<TestResult> {
    let mut results = Vec::with_capacity(templates.len());
    for template in templates {
        let result = match template.expand(env, status_registry, stream_registry) {
            Ok(test) => run_test(&test).await,
            Err(e) => TestResult::errored(template.display_name(), e.to_string()),
        };
        tracing::debug!(name = %result.name, success = result.is_success());
        results.push(result);
    }
    results
}

fn release(guard: crate::expr::CleanupGuard) {
    for e in guard.run() {
        tracing::warn!("cleanup failed: {e}");
    }
}
