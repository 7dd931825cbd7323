//! specrun-types: the value model and result types shared across specrun.
//!
//! This crate provides:
//!
//! - **Value**: the tagged generic value every spec document decodes into
//! - **Results**: per-test outcomes and the run summary

pub mod result;
pub mod value;

pub use result::{AssertionFailure, Summary, TestResult};
pub use value::{ConvertError, Value, json_to_value, value_to_json};
