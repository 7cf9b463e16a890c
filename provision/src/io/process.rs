//! Helpers for running child processes under an execution context with bounded output.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::context::{Cancelled, ExecutionContext};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// Exit status. `None` when the child was killed because the context ended.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub cancelled: Option<Cancelled>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|status| status.success())
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(" [{label} stderr truncated {} bytes]", self.stderr_truncated)
        } else {
            String::new()
        }
    }
}

type OutputHandle = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// A spawned child whose stdout/stderr are drained on reader threads.
#[derive(Debug)]
pub struct RunningCommand {
    child: Child,
    stdout_handle: OutputHandle,
    stderr_handle: OutputHandle,
}

impl RunningCommand {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Wait for the child, checking `ctx` every `poll`.
    ///
    /// If the context is cancelled or expires the child is killed and reaped, and the output
    /// records the cause. Reader threads are always joined before returning.
    #[instrument(skip_all, fields(pid = self.child.id(), poll_ms = poll.as_millis() as u64))]
    pub fn wait(mut self, ctx: &ExecutionContext, poll: Duration) -> Result<CommandOutput> {
        let mut cancelled = None;
        let status = loop {
            if let Err(cause) = ctx.check() {
                warn!(%cause, "context ended, killing command");
                cancelled = Some(cause);
                stop_child(&mut self.child);
                break None;
            }
            let slice = match ctx.remaining() {
                Some(left) => poll.min(left),
                None => poll,
            };
            if let Some(status) = self.child.wait_timeout(slice).context("wait for command")? {
                break Some(status);
            }
        };

        let (stdout, stdout_truncated) = join_output(self.stdout_handle).context("join stdout")?;
        let (stderr, stderr_truncated) = join_output(self.stderr_handle).context("join stderr")?;

        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        debug!(exit_code = ?status.and_then(|s| s.code()), ?cancelled, "command finished");
        Ok(CommandOutput {
            status,
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            cancelled,
        })
    }
}

/// Spawn `cmd` with piped output. `output_limit_bytes` bounds how much of each stream is kept
/// in memory; bytes beyond it are discarded while still draining the pipe.
#[instrument(skip_all, fields(output_limit_bytes))]
pub fn spawn_captured(mut cmd: Command, output_limit_bytes: usize) -> Result<RunningCommand> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    Ok(RunningCommand {
        child,
        stdout_handle,
        stderr_handle,
    })
}

/// Kill and reap `child`. Failures are logged; the caller still owns the cancellation cause.
fn stop_child(child: &mut Child) {
    if let Err(err) = child.kill() {
        warn!(err = %err, "kill command failed");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "reap command after kill failed");
    }
}

fn join_output(handle: OutputHandle) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
