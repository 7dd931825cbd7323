//! specrun CLI entry point.
//!
//! Usage:
//!   specrun [--strict] FILE...   # Run spec files in order
//!   specrun --help

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<u8> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut strict = false;
    let mut files = Vec::new();

    for arg in &args {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(0);
            }
            "--version" | "-V" => {
                println!("specrun {}", env!("CARGO_PKG_VERSION"));
                return Ok(0);
            }
            "--strict" => strict = true,
            other if other.starts_with('-') => {
                anyhow::bail!("unknown option: {other} (see --help)");
            }
            path => files.push(PathBuf::from(path)),
        }
    }

    if files.is_empty() {
        print_help();
        return Ok(2);
    }
    specrun_cli::run(&files, strict)
}

fn print_help() {
    println!(
        "specrun - declarative subprocess test runner

Usage:
  specrun [OPTIONS] FILE...

Options:
  --strict         Reject unrecognized document fields
  -h, --help       Show this help
  -V, --version    Show version

Exit status:
  0  all tests passed
  1  at least one test failed
  2  a document failed to load or validate"
    );
}
