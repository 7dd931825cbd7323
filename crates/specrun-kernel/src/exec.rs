//! Timeout-bounded subprocess execution.
//!
//! Runs one external command with piped stdio and a deadline, and
//! disambiguates the three terminal outcomes (normal exit, fatal signal,
//! timeout). Launch failures and unclassifiable termination states are
//! internal errors, reported as system faults rather than assertion
//! failures.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// One subprocess invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Program and arguments; must be non-empty.
    pub argv: Vec<String>,
    /// Working directory; inherited when `None`.
    pub dir: Option<PathBuf>,
    /// Bytes fed to the child's stdin.
    pub stdin: Vec<u8>,
    /// Extra environment variables, on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Deadline after which the child is killed.
    pub timeout: Duration,
    /// Mirror the child's stdout to this process's stdout as produced.
    pub tee_stdout: bool,
    /// Mirror the child's stderr to this process's stderr as produced.
    pub tee_stderr: bool,
}

impl ExecRequest {
    /// A request with defaults: no stdin, inherited cwd and env, no tee.
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self {
            argv,
            dir: None,
            stdin: Vec::new(),
            env: Vec::new(),
            timeout,
            tee_stdout: false,
            tee_stderr: false,
        }
    }
}

/// How the child terminated. The variants are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Terminated normally with an exit code.
    Exited(i32),
    /// Terminated by a fatal signal before the deadline.
    Signaled(i32),
    /// Killed by the watchdog after the deadline; no exit code is
    /// meaningful.
    TimedOut,
}

/// Captured outcome of a subprocess run.
///
/// stdout and stderr are fully captured regardless of how the child
/// terminated.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ProcessStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Internal execution fault, distinct from any test outcome.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("command is empty")]
    EmptyCommand,
    #[error("failed to spawn \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write stdin: {0}")]
    Stdin(#[source] io::Error),
    #[error("failed to capture output: {0}")]
    Capture(#[source] io::Error),
    #[error("unrecognized process termination state")]
    UnrecognizedStatus,
}

/// Where a captured stream is mirrored while being drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tee {
    None,
    Stdout,
    Stderr,
}

/// Run the command to completion or deadline, capturing both streams.
#[tracing::instrument(level = "debug", skip_all, fields(command = %req.argv.join(" ")))]
pub async fn execute(req: &ExecRequest) -> Result<ProcessOutput, ExecError> {
    let (program, args) = req.argv.split_first().ok_or(ExecError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &req.dir {
        cmd.current_dir(dir);
    }
    for (name, value) in &req.env {
        cmd.env(name, value);
    }

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        command: program.clone(),
        source,
    })?;

    // Start draining both streams before touching stdin; a child that
    // fills an output pipe while blocked on stdin would deadlock us
    // otherwise.
    let stdout_task = child
        .stdout
        .take()
        .map(|r| tokio::spawn(drain(r, if req.tee_stdout { Tee::Stdout } else { Tee::None })));
    let stderr_task = child
        .stderr
        .take()
        .map(|r| tokio::spawn(drain(r, if req.tee_stderr { Tee::Stderr } else { Tee::None })));

    // Write stdin and close it so the child sees EOF.
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(&req.stdin).await.map_err(ExecError::Stdin)?;
    }

    // Race the child against the deadline; whichever completes first
    // decides the outcome and cancels the other.
    let status = tokio::select! {
        status = child.wait() => {
            let status = status.map_err(ExecError::Capture)?;
            classify(status)?
        }
        _ = tokio::time::sleep(req.timeout) => {
            tracing::debug!("deadline reached, killing child");
            let _ = child.start_kill();
            let _ = child.wait().await;
            ProcessStatus::TimedOut
        }
    };

    let stdout = join_drain(stdout_task).await?;
    let stderr = join_drain(stderr_task).await?;

    tracing::debug!(?status, stdout_len = stdout.len(), stderr_len = stderr.len());
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

/// Classify a wait status into the terminal outcomes.
fn classify(status: ExitStatus) -> Result<ProcessStatus, ExecError> {
    if let Some(code) = status.code() {
        Ok(ProcessStatus::Exited(code))
    } else if let Some(signal) = status.signal() {
        Ok(ProcessStatus::Signaled(signal))
    } else {
        Err(ExecError::UnrecognizedStatus)
    }
}

/// Read a stream to EOF, optionally mirroring chunks as they arrive.
async fn drain<R: AsyncRead + Unpin>(mut reader: R, tee: Tee) -> io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        captured.extend_from_slice(&buf[..n]);
        match tee {
            Tee::None => {}
            Tee::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(&buf[..n]).await?;
                out.flush().await?;
            }
            Tee::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(&buf[..n]).await?;
                err.flush().await?;
            }
        }
    }
    Ok(captured)
}

async fn join_drain(
    task: Option<tokio::task::JoinHandle<io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, ExecError> {
    match task {
        None => Ok(Vec::new()),
        Some(handle) => match handle.await {
            Ok(result) => result.map_err(ExecError::Capture),
            Err(join_err) => Err(ExecError::Capture(io::Error::other(join_err))),
        },
    }
}
