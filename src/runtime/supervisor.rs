//! Spawns the wrapped command under a shell and drives its two stream pumps.

use crate::core::error::{Error, Result};
use crate::core::StreamName;
use crate::runtime::pump::{CapturedStream, StreamPump};
use chrono::{DateTime, Utc};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;
use tokio::process::Command;
use tracing::{debug, warn};

/// Everything observed while the command ran
#[derive(Debug)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Launches one command and waits for it to finish
#[derive(Debug, Clone)]
pub struct Supervisor {
    /// Lines kept per stream, `None` disables capture
    capture_lines: Option<usize>,
}

impl Supervisor {
    pub fn new(capture_lines: Option<usize>) -> Self {
        Self { capture_lines }
    }

    /// Run `command` through the shell, relaying its output to `out` and `err`.
    ///
    /// Both pumps are running before the wait on the child starts, so a chatty
    /// child can never block on a full pipe. The pumps are joined after the
    /// child exits; only then are their buffers handed back.
    ///
    /// The writers are handed back alongside the observations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the shell itself cannot be started. A
    /// command that fails inside the shell is not an error: its exit code is
    /// returned like any other.
    pub async fn run<O, E>(&self, command: &str, out: O, err: E) -> Result<(ProcessOutput, O, E)>
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let mut child = shell_command(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::Spawn)?;

        let started_at = Utc::now();
        let started = Instant::now();
        debug!(pid = child.id(), command, "spawned");

        let child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(missing_pipe("stdout")))?;
        let child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Spawn(missing_pipe("stderr")))?;

        let mut stdout_pump = StreamPump::new(StreamName::Stdout, child_stdout, out);
        let mut stderr_pump = StreamPump::new(StreamName::Stderr, child_stderr, err);
        if let Some(lines) = self.capture_lines {
            stdout_pump = stdout_pump.capture(lines);
            stderr_pump = stderr_pump.capture(lines);
        }
        let stdout_task = stdout_pump.spawn();
        let stderr_task = stderr_pump.spawn();

        // Ctrl-C reaches the whole foreground group; the child decides what it means
        let _interrupts = ignore_interrupts();
        let status = child.wait().await?;
        let (stdout, out) = stdout_task.await?;
        let (stderr, err) = stderr_task.await?;
        let duration = started.elapsed();

        let exit_code = exit_code(status);
        debug!(exit_code, elapsed_ms = duration.as_millis() as u64, "command finished");
        if stdout.partial || stderr.partial {
            warn!("output capture ended early; the analysis may be incomplete");
        }

        let output = ProcessOutput {
            exit_code,
            stdout,
            stderr,
            started_at,
            duration,
        };
        Ok((output, out, err))
    }
}

/// Keep SIGINT from terminating the wrapper while the child runs.
///
/// Registering a listener replaces the default disposition for the rest of
/// the process lifetime.
#[cfg(unix)]
fn ignore_interrupts() -> Option<tokio::signal::unix::Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::interrupt())
        .map_err(|e| debug!(error = %e, "could not install SIGINT listener"))
        .ok()
}

#[cfg(not(unix))]
fn ignore_interrupts() -> Option<()> {
    None
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let shell = which::which("sh").unwrap_or_else(|_| "/bin/sh".into());
    let mut cmd = Command::new(shell);
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("child {} was not captured", name),
    )
}

/// The child's exit code, or `128 + signal` when it was killed by a signal
#[cfg(unix)]
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

#[cfg(not(unix))]
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
