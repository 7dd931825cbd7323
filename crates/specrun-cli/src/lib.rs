//! specrun CLI: load spec files, validate them all, run every test in
//! order, and report per-test lines plus a summary.

pub mod format;
pub mod load;

use std::path::{Path, PathBuf};

use anyhow::Result;
use specrun_kernel::{
    Env, TestTemplate, Validator, parse_spec, run_templates, status_registry, stream_registry,
};
use specrun_types::Summary;

/// Run spec files on a fresh single-threaded runtime.
///
/// Tests execute strictly sequentially; the only concurrency in the
/// system is each test's timeout watchdog.
pub fn run(files: &[PathBuf], strict: bool) -> Result<u8> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_files(files, strict))
}

/// Validate every file, then run them in order.
///
/// Exit code: 0 when everything passed, 1 when any test failed, 2 when
/// any document failed to load or validate (nothing is executed then).
pub async fn run_files(files: &[PathBuf], strict: bool) -> Result<u8> {
    let mut suites: Vec<(PathBuf, Vec<TestTemplate>)> = Vec::new();
    let mut invalid = false;

    // Validate everything up front; one bad document blocks the run,
    // and every document's violations are reported together.
    for file in files {
        match load_and_validate(file, strict) {
            Ok(templates) => suites.push((file.clone(), templates)),
            Err(message) => {
                eprintln!("{message}");
                invalid = true;
            }
        }
    }
    if invalid {
        return Ok(2);
    }

    let status = status_registry()?;
    let stream = stream_registry()?;
    let env = Env::new();

    let mut all = Vec::new();
    for (file, templates) in &suites {
        tracing::debug!(file = %file.display(), tests = templates.len(), "running spec");
        let results = run_templates(templates, &env, &status, &stream).await;
        for result in &results {
            println!("{}", format::format_result(result));
        }
        all.extend(results);
    }

    let summary = Summary::of(&all);
    println!("{}", format::format_summary(&summary));
    Ok(if summary.failed > 0 { 1 } else { 0 })
}

fn load_and_validate(file: &Path, strict: bool) -> Result<Vec<TestTemplate>, String> {
    let document = load::load_spec_file(file).map_err(|e| e.to_string())?;
    let mut v = Validator::new(file.to_string_lossy(), strict);
    let templates = parse_spec(&mut v, &document);
    if let Some(err) = v.error() {
        return Err(format!("{}:\n{err}", file.display()));
    }
    // A parse without violations always yields templates; guard anyway.
    templates.ok_or_else(|| format!("{}: invalid document", file.display()))
}
