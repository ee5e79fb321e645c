//! Generic subprocess runner with streaming output.
//!
//! Provides async process execution with:
//! - Byte-chunk stdout streaming into a [`ProgressSink`]
//! - Timeout with SIGTERM-then-SIGKILL escalation
//! - Accumulated-output cap with partial-output salvage
//! - Configurable retry with exponential backoff
//!
//! The runner reports failures in-band through [`RunResult`] rather than as
//! errors; classification of failure text happens upstream.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::config::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT, TERMINATION_GRACE};
use crate::progress::ProgressSink;

/// Failure classes a retry policy can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    /// The run was killed by the timeout path.
    Timeout,
    /// The process exited with a non-zero code.
    ExitNonZero,
    /// The process could not be spawned at all.
    SpawnError,
}

/// Retry configuration for [`run`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, including the first.
    pub attempts: u32,
    /// Base backoff, doubled after each failed attempt.
    pub backoff: Duration,
    /// Failure classes that trigger a retry; anything else returns immediately.
    pub retry_on: Vec<RetryTrigger>,
}

/// Execution options for [`run`].
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub cwd: Option<PathBuf>,
    pub retry: Option<RetryPolicy>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cwd: None,
            retry: None,
        }
    }
}

/// Outcome of a single (possibly retried) run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Exit code zero and the output cap was not hit.
    pub ok: bool,
    /// None when the process never produced an exit code (spawn failure or
    /// killed by signal).
    pub exit_code: Option<i32>,
    /// Name of the signal that terminated the process, if any.
    pub signal: Option<String>,
    /// Accumulated stdout, trimmed.
    pub stdout: String,
    /// Accumulated stderr, trimmed.
    pub stderr: String,
    /// Termination was driven by the configured timeout.
    pub timed_out: bool,
    /// Captured stdout prefix when the output cap was exceeded. Distinct from
    /// `stdout` so callers can choose to salvage it.
    pub partial_stdout: Option<String>,
}

impl RunResult {
    fn spawn_failure(stderr: String) -> Self {
        Self {
            ok: false,
            exit_code: None,
            signal: None,
            stdout: String::new(),
            stderr,
            timed_out: false,
            partial_stdout: None,
        }
    }

    const fn matches(&self, trigger: RetryTrigger) -> bool {
        match trigger {
            RetryTrigger::Timeout => self.timed_out,
            RetryTrigger::ExitNonZero => {
                matches!(self.exit_code, Some(code) if code != 0)
            }
            RetryTrigger::SpawnError => self.exit_code.is_none() && self.signal.is_none(),
        }
    }
}

/// Run `command` with `args`, streaming stdout into `progress`.
///
/// Arguments are passed as a vector, never through a shell. A supplied retry
/// policy re-runs failed attempts matching one of its triggers with
/// exponential backoff (`backoff * 2^(attempt-1)`); the last result is
/// returned either way.
pub async fn run(
    command: &str,
    args: &[String],
    options: &ExecOptions,
    progress: &ProgressSink,
) -> RunResult {
    let max_attempts = options.retry.as_ref().map_or(1, |r| r.attempts.max(1));
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = run_once(command, args, options, progress).await;
        if result.ok || attempt >= max_attempts {
            return result;
        }

        let Some(retry) = &options.retry else {
            return result;
        };
        if !retry.retry_on.iter().any(|t| result.matches(*t)) {
            return result;
        }

        let delay = retry.backoff * 2u32.saturating_pow(attempt - 1);
        tracing::warn!(
            command,
            attempt = attempt + 1,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "retrying command after backoff"
        );
        tokio::time::sleep(delay).await;
    }
}

async fn run_once(
    command: &str,
    args: &[String],
    options: &ExecOptions,
    progress: &ProgressSink,
) -> RunResult {
    let started = Instant::now();
    tracing::debug!(command, ?args, cwd = ?options.cwd, "spawning command");

    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &options.cwd {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return RunResult::spawn_failure(format!(
                "Command '{command}' not found. Is it installed and in PATH?"
            ));
        }
        Err(err) => {
            return RunResult::spawn_failure(format!("Failed to spawn '{command}': {err}"));
        }
    };

    // stderr is accumulated only, reserved for failure diagnostics.
    let stderr_pipe = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe {
            let _ = BufReader::new(pipe).read_to_string(&mut buf).await;
        }
        buf
    });

    let mut stdout_pipe = child.stdout.take();
    let mut collected: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut capped = false;
    let mut timed_out = false;

    if let Some(stdout) = stdout_pipe.as_mut() {
        loop {
            let remaining = options.timeout.saturating_sub(started.elapsed());
            tokio::select! {
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if collected.len() + n > options.max_output_bytes {
                            capped = true;
                            tracing::warn!(
                                cap = options.max_output_bytes,
                                "stdout exceeded output cap, terminating child"
                            );
                            terminate(&mut child).await;
                            break;
                        }
                        collected.extend_from_slice(&chunk[..n]);
                        progress.emit(&String::from_utf8_lossy(&chunk[..n]));
                    }
                },
                () = tokio::time::sleep(remaining) => {
                    timed_out = true;
                    tracing::warn!(
                        timeout_ms = options.timeout.as_millis() as u64,
                        "process timeout, sending SIGTERM"
                    );
                    terminate(&mut child).await;
                    break;
                }
            }
        }
    }

    // The child may outlive its stdout; the timeout still applies to the wait.
    let remaining = options.timeout.saturating_sub(started.elapsed());
    let status = match tokio::time::timeout(remaining, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(err)) => {
            tracing::error!(%err, "failed to wait for child");
            None
        }
        Err(_) if timed_out || capped => child.wait().await.ok(),
        Err(_) => {
            timed_out = true;
            tracing::warn!("process timeout while waiting for exit, sending SIGTERM");
            terminate(&mut child).await;
            child.wait().await.ok()
        }
    };

    let stderr = stderr_task.await.unwrap_or_default();
    let stdout = String::from_utf8_lossy(&collected).into_owned();
    let exit_code = status.and_then(|s| s.code());
    let signal = status.and_then(signal_name);
    let ok = exit_code == Some(0) && !capped;

    tracing::debug!(
        command,
        ?exit_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        stdout_bytes = stdout.len(),
        "command completed"
    );

    RunResult {
        ok,
        exit_code,
        signal,
        stdout: stdout.trim().to_string(),
        stderr: stderr.trim().to_string(),
        timed_out,
        partial_stdout: capped.then(|| stdout.trim().to_string()),
    }
}

/// Graceful termination: SIGTERM, a grace window, then SIGKILL.
async fn terminate(child: &mut Child) {
    send_sigterm(child);
    if tokio::time::timeout(TERMINATION_GRACE, child.wait()).await.is_err() {
        tracing::error!("process did not terminate within grace window, sending SIGKILL");
        let _ = child.start_kill();
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) {
    if let Some(pid) = child.id() {
        // SAFETY: signaling a child process we spawned and still own.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &Child) {
    // No SIGTERM equivalent; the grace window just delays the hard kill.
    let _ = child;
}

#[cfg(unix)]
fn signal_name(status: std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|n| match n {
        libc::SIGTERM => "SIGTERM".to_string(),
        libc::SIGKILL => "SIGKILL".to_string(),
        libc::SIGINT => "SIGINT".to_string(),
        other => format!("signal {other}"),
    })
}

#[cfg(not(unix))]
fn signal_name(_status: std::process::ExitStatus) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn captures_stdout_of_successful_command() {
        let result = run(
            "echo",
            &args(&["hello world"]),
            &ExecOptions::default(),
            &ProgressSink::disabled(),
        )
        .await;

        assert!(result.ok);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "hello world");
        assert!(result.stderr.is_empty());
        assert!(!result.timed_out);
        assert!(result.partial_stdout.is_none());
    }

    #[tokio::test]
    async fn reports_nonzero_exit_with_stderr() {
        let result = run(
            "sh",
            &args(&["-c", "echo oops >&2; exit 42"]),
            &ExecOptions::default(),
            &ProgressSink::disabled(),
        )
        .await;

        assert!(!result.ok);
        assert_eq!(result.exit_code, Some(42));
        assert_eq!(result.stderr, "oops");
    }

    #[tokio::test]
    async fn spawn_failure_distinguishes_not_found() {
        let result = run(
            "definitely_not_a_real_binary_12345",
            &[],
            &ExecOptions::default(),
            &ProgressSink::disabled(),
        )
        .await;

        assert!(!result.ok);
        assert_eq!(result.exit_code, None);
        assert!(result.stderr.contains("not found"));
        assert!(result.stderr.contains("PATH"));
    }

    #[tokio::test]
    async fn timeout_terminates_within_bounded_window() {
        let options = ExecOptions {
            timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let started = Instant::now();
        let result = run(
            "sleep",
            &args(&["30"]),
            &options,
            &ProgressSink::disabled(),
        )
        .await;

        assert!(result.timed_out);
        assert!(!result.ok);
        assert_eq!(result.exit_code, None);
        // Timeout plus grace window, with slack for slow CI.
        assert!(started.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test]
    async fn output_cap_preserves_partial_stdout() {
        let options = ExecOptions {
            max_output_bytes: 1024,
            ..Default::default()
        };
        let result = run(
            "sh",
            &args(&["-c", "head -c 100000 /dev/zero | tr '\\0' 'x'; sleep 5"]),
            &options,
            &ProgressSink::disabled(),
        )
        .await;

        assert!(!result.ok);
        assert!(!result.timed_out);
        let partial = result.partial_stdout.expect("partial output retained");
        assert!(!partial.is_empty());
        assert!(partial.len() <= 1024);
    }

    #[tokio::test]
    async fn progress_receives_chunks_in_order_until_cap() {
        let (sink, mut rx) = ProgressSink::channel(64);
        let result = run(
            "sh",
            &args(&["-c", "printf first; sleep 0.05; printf second"]),
            &ExecOptions::default(),
            &sink,
        )
        .await;
        drop(sink);

        assert!(result.ok);
        let mut seen = String::new();
        while let Some(chunk) = rx.recv().await {
            seen.push_str(&chunk);
        }
        assert_eq!(seen, "firstsecond");
    }

    #[tokio::test]
    async fn output_cap_stops_progress_emission() {
        let (sink, mut rx) = ProgressSink::channel(64);
        let options = ExecOptions {
            max_output_bytes: 1024,
            ..Default::default()
        };
        let result = run(
            "sh",
            &args(&["-c", "head -c 100000 /dev/zero | tr '\\0' 'x'; sleep 5"]),
            &options,
            &sink,
        )
        .await;
        drop(sink);

        assert!(!result.ok);
        assert!(result.partial_stdout.is_some());
        // The chunk that crosses the cap is dropped, not relayed, so the
        // observer never sees more than the cap.
        let mut relayed = 0;
        while let Some(chunk) = rx.recv().await {
            relayed += chunk.len();
        }
        assert!(relayed <= 1024);
    }

    #[tokio::test]
    async fn retries_until_flaky_command_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran-once");
        let script = format!(
            "if [ -e {m} ]; then echo recovered; else touch {m}; exit 1; fi",
            m = marker.display()
        );
        let options = ExecOptions {
            retry: Some(RetryPolicy {
                attempts: 2,
                backoff: Duration::from_millis(10),
                retry_on: vec![RetryTrigger::ExitNonZero],
            }),
            ..Default::default()
        };

        let result = run("sh", &args(&["-c", &script]), &options, &ProgressSink::disabled()).await;
        assert!(result.ok);
        assert_eq!(result.stdout, "recovered");
    }

    #[tokio::test]
    async fn non_matching_failures_return_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("attempts");
        let script = format!("echo x >> {c}; exit 3", c = counter.display());
        let options = ExecOptions {
            retry: Some(RetryPolicy {
                attempts: 3,
                backoff: Duration::from_millis(10),
                retry_on: vec![RetryTrigger::Timeout],
            }),
            ..Default::default()
        };

        let result = run("sh", &args(&["-c", &script]), &options, &ProgressSink::disabled()).await;
        assert!(!result.ok);
        assert_eq!(result.exit_code, Some(3));
        let attempts = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(attempts.lines().count(), 1);
    }
}
