//! Bounded execution of external tools (ffmpeg, ffprobe).
//!
//! Every call carries a timeout. Cancellation and timeouts are implemented by
//! killing the child process; nothing is left to resume afterwards.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often a running child is polled for exit/cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors from running an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Tool exited unsuccessfully; `stderr` is the tool's diagnostic output verbatim.
    #[error("{tool} failed with exit code {exit_code}: {stderr}")]
    Failed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{tool} timed out after {:.1}s", .timeout.as_secs_f64())]
    TimedOut { tool: String, timeout: Duration },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Handle for cancelling a running tool from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The running child is killed at the next poll.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Run a command to completion with a timeout and optional cancellation.
///
/// stdout and stderr are drained on background threads so a chatty child
/// cannot block on a full pipe while we wait on it.
pub fn run_tool(
    mut cmd: Command,
    timeout: Duration,
    cancel: Option<&CancelHandle>,
) -> ToolResult<ToolOutput> {
    let tool = cmd.get_program().to_string_lossy().to_string();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!("$ {:?}", cmd);

    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        tool: tool.clone(),
        source,
    })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let status = wait_bounded(&mut child, &tool, timeout, cancel);

    let stdout = join_drain(stdout_reader);
    let stderr = String::from_utf8_lossy(&join_drain(stderr_reader)).to_string();

    let status = status?;
    if !status.success() {
        return Err(ToolError::Failed {
            tool,
            exit_code: status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

fn wait_bounded(
    child: &mut Child,
    tool: &str,
    timeout: Duration,
    cancel: Option<&CancelHandle>,
) -> ToolResult<ExitStatus> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(source) => {
                kill_quietly(child);
                return Err(ToolError::Io {
                    tool: tool.to_string(),
                    source,
                });
            }
        }

        if cancel.is_some_and(|c| c.is_cancelled()) {
            tracing::warn!("Cancelling {}", tool);
            kill_quietly(child);
            return Err(ToolError::Cancelled {
                tool: tool.to_string(),
            });
        }

        if started.elapsed() >= timeout {
            tracing::warn!("{} exceeded {:.0}s timeout, killing", tool, timeout.as_secs_f64());
            kill_quietly(child);
            return Err(ToolError::TimedOut {
                tool: tool.to_string(),
                timeout,
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
