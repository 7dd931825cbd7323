//! specrun-kernel: the core of specrun.
//!
//! This crate provides:
//!
//! - **Validator**: path-tracking schema validation over the generic value
//!   model, accumulating every violation instead of stopping at the first
//! - **Template**: variable scopes and deferred placeholder substitution
//! - **Expr**: string-producing expressions with resource cleanup
//! - **Matcher**: the pluggable assertion registry and built-in matchers
//! - **Exec**: timeout-bounded subprocess execution
//! - **Parser**: spec documents to test templates
//! - **Runner**: test orchestration producing results

pub mod exec;
pub mod expr;
pub mod matcher;
pub mod parser;
pub mod runner;
pub mod template;
pub mod validator;

pub use exec::{ExecError, ExecRequest, ProcessOutput, ProcessStatus};
pub use expr::{Cleanup, CleanupGuard, EvalError, StringExpr, eval_string_exprs};
pub use matcher::{
    BoxMatcher, Match, MatchError, Matcher, MatcherRegistry, RegistryError, status_registry,
    stream_registry,
};
pub use parser::{SPEC_VERSION, parse_spec};
pub use runner::{run_templates, run_test};
pub use template::{Env, ExpandError, FromValue, Templatable, TemplateRef, TemplateValue};
pub use test::{EnvVarTemplate, StdinTemplate, Test, TestStdin, TestTemplate};
pub use validator::{ValidationError, Validator, Violation};
