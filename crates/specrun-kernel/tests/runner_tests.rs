//! End-to-end runner tests: parse a document, expand, execute real
//! commands, and check the reported results.

use specrun_kernel::{
    Env, MatcherRegistry, TestTemplate, Validator, parse_spec, run_templates, status_registry,
    stream_registry,
};
use specrun_types::{Summary, Value, json_to_value};

fn decode(yaml: &str) -> Value {
    let json: serde_json::Value = serde_yaml::from_str(yaml).expect("document should decode");
    json_to_value(json).expect("document should convert")
}

fn parse(yaml: &str) -> Vec<TestTemplate> {
    let mut v = Validator::new("spec.yaml", true);
    let templates = parse_spec(&mut v, &decode(yaml));
    assert!(v.error().is_none(), "unexpected violations: {:?}", v.error());
    templates.expect("document should parse")
}

fn registries() -> (MatcherRegistry<i32>, MatcherRegistry<[u8]>) {
    (
        status_registry().expect("status registry"),
        stream_registry().expect("stream registry"),
    )
}

async fn run(yaml: &str) -> Vec<specrun_types::TestResult> {
    run_with_env(yaml, &Env::new()).await
}

async fn run_with_env(yaml: &str, env: &Env) -> Vec<specrun_types::TestResult> {
    let templates = parse(yaml);
    let (status, stream) = registries();
    run_templates(&templates, env, &status, &stream).await
}

// ============================================================================
// Passing and failing assertions
// ============================================================================

#[tokio::test]
async fn echo_with_matching_expectations_passes() {
    let results = run(
        r#"
tests:
  - command: [echo, "42"]
    expect:
      status: {eq: 0}
      stdout: {eq: "42\n"}
"#,
    )
    .await;
    assert_eq!(results.len(), 1);
    assert!(results[0].is_success(), "result: {:?}", results[0]);
    assert_eq!(results[0].name, "echo 42");
}

#[tokio::test]
async fn failing_status_assertion_is_reported() {
    let results = run(
        r#"
tests:
  - command: [sh, -c, "exit 3"]
    expect:
      status: {eq: 0}
"#,
    )
    .await;
    assert!(!results[0].is_success());
    assert_eq!(results[0].failures.len(), 1);
    assert_eq!(results[0].failures[0].subject, "status");
    assert_eq!(results[0].failures[0].message, "status should be 0, but is 3");
}

#[tokio::test]
async fn failures_are_ordered_status_stdout_stderr() {
    let results = run(
        r#"
tests:
  - command: [sh, -c, "echo out; echo err >&2; exit 1"]
    expect:
      status: {eq: 0}
      stdout: {eq: "nope\n"}
      stderr: beEmpty
"#,
    )
    .await;
    let subjects: Vec<_> = results[0]
        .failures
        .iter()
        .map(|f| f.subject.clone())
        .collect();
    assert_eq!(subjects, vec!["status", "stdout", "stderr"]);
}

#[tokio::test]
async fn negated_stream_assertion_matches_different_output() {
    let results = run(
        r#"
tests:
  - command: [echo, y]
    expect:
      stdout: {not: {eq: "x"}}
"#,
    )
    .await;
    assert!(results[0].is_success());
}

#[tokio::test]
async fn stdin_is_piped_to_the_command() {
    let results = run(
        r#"
tests:
  - command: [cat]
    stdin: "hello from stdin"
    expect:
      stdout: {eq: "hello from stdin"}
"#,
    )
    .await;
    assert!(results[0].is_success(), "result: {:?}", results[0]);
}

#[tokio::test]
async fn yaml_stdin_is_serialized() {
    let results = run(
        r#"
tests:
  - command: [cat]
    stdin:
      format: yaml
      value:
        answer: 42
    expect:
      stdout: {eq: "answer: 42\n"}
"#,
    )
    .await;
    assert!(results[0].is_success(), "result: {:?}", results[0]);
}

#[tokio::test]
async fn env_overrides_reach_the_command() {
    let results = run(
        r#"
tests:
  - command: [sh, -c, "printf %s \"$PROBE\""]
    env:
      - name: PROBE
        value: live
    expect:
      stdout: {eq: "live"}
"#,
    )
    .await;
    assert!(results[0].is_success(), "result: {:?}", results[0]);
}

// ============================================================================
// Timeouts and signals
// ============================================================================

#[tokio::test]
async fn timed_out_process_fails_with_a_timeout_message() {
    let results = run(
        r#"
tests:
  - command: [sleep, "1"]
    timeout: 1ms
"#,
    )
    .await;
    assert!(!results[0].is_success());
    assert_eq!(results[0].failures[0].subject, "status");
    assert_eq!(results[0].failures[0].message, "process was timeout");
}

#[tokio::test]
async fn signaled_process_fails_with_the_signal() {
    let results = run(
        r#"
tests:
  - command: [sh, -c, "kill -KILL $$"]
"#,
    )
    .await;
    assert!(!results[0].is_success());
    assert_eq!(
        results[0].failures[0].message,
        "process was signaled (9)"
    );
}

#[tokio::test]
async fn stream_matchers_still_run_after_a_timeout() {
    let results = run(
        r#"
tests:
  - command: [sh, -c, "echo early; sleep 2"]
    timeout: 200ms
    expect:
      stdout: {contain: "early"}
"#,
    )
    .await;
    // The timeout is a status failure, but stdout matched.
    assert_eq!(results[0].failures.len(), 1);
    assert_eq!(results[0].failures[0].subject, "status");
}

// ============================================================================
// Internal errors
// ============================================================================

#[tokio::test]
async fn spawn_failure_is_an_error_not_an_assertion_failure() {
    let results = run(
        r#"
tests:
  - command: [/nonexistent/specrun-probe]
"#,
    )
    .await;
    assert!(!results[0].is_success());
    assert!(results[0].failures.is_empty());
    assert!(results[0].error.as_deref().unwrap().contains("spawn"));
}

#[tokio::test]
async fn one_erroring_test_does_not_abort_the_rest() {
    let results = run(
        r#"
tests:
  - command: [/nonexistent/specrun-probe]
  - command: ["true"]
"#,
    )
    .await;
    assert_eq!(results.len(), 2);
    assert!(!results[0].is_success());
    assert!(results[1].is_success());

    let summary = Summary::of(&results);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}

// ============================================================================
// Variables
// ============================================================================

#[tokio::test]
async fn command_variables_resolve_before_execution() {
    let yaml = r#"
tests:
  - command: [{"$": "cmd"}, "42"]
    expect:
      stdout: {eq: "42\n"}
"#;
    let mut env = Env::new();
    env.define("cmd", Value::String("echo".into()));
    let results = run_with_env(yaml, &env).await;
    assert!(results[0].is_success(), "result: {:?}", results[0]);
}

#[tokio::test]
async fn undefined_variable_errors_only_the_affected_test() {
    let yaml = r#"
tests:
  - command: [{"$": "missing"}]
  - command: ["true"]
"#;
    let results = run(yaml).await;
    assert!(!results[0].is_success());
    assert!(
        results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("variable \"missing\" is not defined")
    );
    assert!(results[1].is_success());
}

#[tokio::test]
async fn one_template_expands_under_different_environments() {
    let templates = parse(
        r#"
tests:
  - command: [echo, {"$": "word"}]
"#,
    );
    let (status, stream) = registries();

    let mut first = Env::new();
    first.define("word", Value::String("one".into()));
    let mut second = Env::new();
    second.define("word", Value::String("two".into()));

    let a = templates[0].expand(&first, &status, &stream).unwrap();
    let b = templates[0].expand(&second, &status, &stream).unwrap();
    assert_eq!(a.name, "echo one");
    assert_eq!(b.name, "echo two");
}

// ============================================================================
// Ephemeral files
// ============================================================================

#[tokio::test]
async fn file_arguments_are_materialized_and_removed() {
    let results = run(
        r#"
tests:
  - command: [cat, {type: file, value: "file payload"}]
    expect:
      stdout: {eq: "file payload"}
"#,
    )
    .await;
    assert!(results[0].is_success(), "result: {:?}", results[0]);

    // The temp file is gone after the test; nothing with our prefix
    // should be left holding the payload.
    let mut leftovers = Vec::new();
    for entry in std::fs::read_dir(std::env::temp_dir()).unwrap().flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("specrun-")
            && let Ok(contents) = std::fs::read_to_string(entry.path())
            && contents == "file payload"
        {
            leftovers.push(name);
        }
    }
    assert_eq!(leftovers, Vec::<String>::new());
}

// ============================================================================
// Strict validation (document level)
// ============================================================================

#[test]
fn unknown_field_in_strict_mode_blocks_the_document() {
    let mut v = Validator::new("spec.yaml", true);
    let doc = decode(
        r#"
tests:
  - command: ["true"]
    bogus: 1
"#,
    );
    assert!(parse_spec(&mut v, &doc).is_none());
    assert_eq!(
        v.error().unwrap().to_string(),
        "$.tests[0]: field .bogus is not expected"
    );
}

#[test]
fn all_document_violations_surface_together() {
    let mut v = Validator::new("spec.yaml", true);
    let doc = decode(
        r#"
spexec: v9
tests:
  - command: []
  - {}
"#,
    );
    assert!(parse_spec(&mut v, &doc).is_none());
    let text = v.error().unwrap().to_string();
    assert!(text.contains("$.spexec: should be \"v0\", but is \"v9\""), "got: {text}");
    assert!(text.contains("$.tests[0].command: should not be empty"), "got: {text}");
    assert!(text.contains("$.tests[1]: should have .command"), "got: {text}");
}
