//! Validation tests using rstest for parameterized violation tables.

use rstest::rstest;
use specrun_kernel::{Validator, parse_spec};
use specrun_types::{Value, json_to_value};

fn decode(yaml: &str) -> Value {
    let json: serde_json::Value = serde_yaml::from_str(yaml).expect("document should decode");
    json_to_value(json).expect("document should convert")
}

/// Validate a document in strict mode and return the violation lines.
fn violations(yaml: &str) -> Vec<String> {
    let mut v = Validator::new("spec.yaml", true);
    let _ = parse_spec(&mut v, &decode(yaml));
    v.violations().iter().map(ToString::to_string).collect()
}

#[rstest]
#[case::top_level_not_a_map(
    "- 1\n- 2\n",
    "$: should be map, but is seq"
)]
#[case::wrong_version(
    "spexec: v1\ntests: []\n",
    "$.spexec: should be \"v0\", but is \"v1\""
)]
#[case::version_not_a_string(
    "spexec: 7\ntests: []\n",
    "$.spexec: should be string, but is int"
)]
#[case::tests_missing(
    "spexec: v0\n",
    "$: should have .tests"
)]
#[case::tests_not_a_seq(
    "tests: true\n",
    "$.tests: should be seq, but is bool"
)]
#[case::test_not_a_map(
    "tests: [3]\n",
    "$.tests[0]: should be map, but is int"
)]
#[case::command_missing(
    "tests: [{}]\n",
    "$.tests[0]: should have .command"
)]
#[case::command_empty(
    "tests: [{command: []}]\n",
    "$.tests[0].command: should not be empty"
)]
#[case::unknown_test_field(
    "tests: [{command: [\"true\"], bogus: 1}]\n",
    "$.tests[0]: field .bogus is not expected"
)]
#[case::unknown_expect_field(
    "tests: [{command: [\"true\"], expect: {exitCode: 0}}]\n",
    "$.tests[0].expect: field .exitCode is not expected"
)]
#[case::name_not_a_string(
    "tests: [{command: [\"true\"], name: 1}]\n",
    "$.tests[0].name: should be string, but is int"
)]
#[case::timeout_garbage(
    "tests: [{command: [\"true\"], timeout: fast}]\n",
    "$.tests[0].timeout: cannot parse \"fast\" as duration"
)]
#[case::tee_not_a_bool(
    "tests: [{command: [\"true\"], teeStdout: 1}]\n",
    "$.tests[0].teeStdout: should be bool, but is int"
)]
#[case::env_not_a_seq(
    "tests: [{command: [\"true\"], env: {A: 1}}]\n",
    "$.tests[0].env: should be seq, but is map"
)]
#[case::env_name_invalid(
    "tests: [{command: [\"true\"], env: [{name: \"x y\", value: v}]}]\n",
    "$.tests[0].env[0].name: \"x y\" is not a valid variable name"
)]
#[case::stdin_bad_format(
    "tests: [{command: [cat], stdin: {format: json, value: {}}}]\n",
    "$.tests[0].stdin.format: should be \"yaml\", but is \"json\""
)]
#[case::string_expr_env_without_name(
    "tests: [{command: [{type: env}]}]\n",
    "$.tests[0].command[0]: should have .name"
)]
#[case::string_expr_unknown_type(
    "tests: [{command: [{type: socket}]}]\n",
    "$.tests[0].command[0].type: should be \"env\" or \"file\", but is \"socket\""
)]
fn strict_validation_reports(#[case] yaml: &str, #[case] expected: &str) {
    let found = violations(yaml);
    assert!(
        found.iter().any(|line| line == expected),
        "expected {expected:?} in {found:?}"
    );
}

#[test]
fn a_clean_document_has_no_violations() {
    let lines = violations(
        r#"
spexec: v0
tests:
  - name: answer
    command: [echo, "42"]
    stdin: "input"
    env:
      - name: MODE
        value: test
    expect:
      status: {eq: 0}
      stdout: {eq: "42\n"}
      stderr: beEmpty
    timeout: 3s
    teeStdout: false
"#,
    );
    assert_eq!(lines, Vec::<String>::new());
}

#[test]
fn violations_keep_document_order() {
    let lines = violations(
        r#"
tests:
  - command: [1]
  - name: 2
    command: [echo]
"#,
    );
    assert_eq!(
        lines,
        vec![
            "$.tests[0].command[0]: should be string or map, but is int",
            "$.tests[1].name: should be string, but is int",
        ]
    );
}
