//! External process execution with log capture and timeouts.
//!
//! Every encoder/probe invocation goes through [`run_logged`] so each
//! command line, its stdout, and its stderr land in the job log. A
//! deadline-exceeded process gets SIGTERM, a grace period, then a hard
//! kill; a timeout is reported as a distinct failure kind because it
//! means a hang, not a deterministic rejection.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use reelforge_common::error::{ReelforgeError, ReelforgeResult};

/// How long a SIGTERM'd process gets to exit before the hard kill.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Result of one external-process invocation.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub ok: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutcome {
    /// Convert a failed outcome into the matching error, keeping the
    /// stderr tail as detail.
    pub fn into_result(self, program: &str, timeout: Option<Duration>) -> ReelforgeResult<Self> {
        if self.ok {
            return Ok(self);
        }
        if self.timed_out {
            return Err(ReelforgeError::Timeout {
                program: program.to_string(),
                seconds: timeout.map(|t| t.as_secs_f64()).unwrap_or(0.0),
            });
        }
        Err(ReelforgeError::CommandFailed {
            program: program.to_string(),
            code: self.exit_code.unwrap_or(-1),
            detail: tail_of(&self.stderr, 800),
        })
    }
}

/// Run a command, capture its output, and append a transcript to the log.
/// Never fails on a non-zero exit; callers inspect `ok` or use
/// [`run_checked`].
pub async fn run_logged(
    cmd: &[String],
    log_path: Option<&Path>,
    timeout: Option<Duration>,
) -> ReelforgeResult<CommandOutcome> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| ReelforgeError::render("cannot run an empty command"))?;

    tracing::debug!(program = %program, args = args.len(), "Spawning external process");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReelforgeError::render(format!("failed to start {program}: {e}")))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ReelforgeError::render("failed to capture process stdout"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ReelforgeError::render("failed to capture process stderr"))?;

    // Drain both pipes concurrently so ffmpeg cannot block on a full pipe.
    let stdout_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stdout_pipe.read_to_string(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr_pipe.read_to_string(&mut buf).await;
        buf
    });

    let (status, timed_out) = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => (Some(status?), false),
            Err(_) => {
                tracing::warn!(program = %program, timeout_secs = limit.as_secs_f64(), "Process deadline exceeded; terminating");
                terminate(&mut child).await;
                (None, true)
            }
        },
        None => (Some(child.wait().await?), false),
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    let outcome = CommandOutcome {
        ok: status.as_ref().map(|s| s.success()).unwrap_or(false),
        exit_code: status.and_then(|s| s.code()),
        stdout,
        stderr,
        timed_out,
    };

    if let Some(log_path) = log_path {
        append_transcript(log_path, cmd, &outcome, timeout)?;
    }

    Ok(outcome)
}

/// Like [`run_logged`], but maps failure to `CommandFailed`/`Timeout`.
pub async fn run_checked(
    cmd: &[String],
    log_path: Option<&Path>,
    timeout: Option<Duration>,
) -> ReelforgeResult<CommandOutcome> {
    let program = cmd.first().cloned().unwrap_or_default();
    let outcome = run_logged(cmd, log_path, timeout).await?;
    outcome.into_result(&program, timeout)
}

/// SIGTERM the child, give it a grace period, then kill it outright.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.kill().await;
}

fn append_transcript(
    log_path: &Path,
    cmd: &[String],
    outcome: &CommandOutcome,
    timeout: Option<Duration>,
) -> ReelforgeResult<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut handle = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    writeln!(handle, "$ {}", cmd.join(" "))?;
    // The filtergraph is the usual culprit in encode failures; repeat it
    // on its own line so it survives shell-quoting ambiguity in the log.
    if let Some(idx) = cmd.iter().position(|arg| arg == "-filter_complex") {
        if let Some(graph) = cmd.get(idx + 1) {
            writeln!(handle, "filter_complex_repr={graph:?}")?;
        }
    }
    if !outcome.stdout.is_empty() {
        writeln!(handle, "{}", outcome.stdout.trim_end())?;
    }
    if !outcome.stderr.is_empty() {
        writeln!(handle, "{}", outcome.stderr.trim_end())?;
    }
    if outcome.timed_out {
        let secs = timeout.map(|t| t.as_secs_f64()).unwrap_or(0.0);
        writeln!(handle, "Command timed out after {secs}s")?;
    }
    Ok(())
}

fn tail_of(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= max_chars {
        return trimmed.to_string();
    }
    let start = trimmed.len() - max_chars;
    // Avoid splitting a UTF-8 sequence.
    let boundary = (start..trimmed.len())
        .find(|&i| trimmed.is_char_boundary(i))
        .unwrap_or(start);
    trimmed[boundary..].to_string()
}
