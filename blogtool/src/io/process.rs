//! Helpers for running external tools with timeouts and bounded output.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::{BlogError, Result};

/// Captured output of one tool invocation.
///
/// Every field is always populated: a process killed by a signal reports exit
/// code `-1`, and missing output is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Text worth showing a user: stderr, or stdout when stderr is empty.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exited with code {} and no output", self.exit_code)
    }

    /// Turn a timeout or non-zero exit into the matching error.
    pub fn check(self, command: &str, timeout: Duration) -> Result<ToolOutput> {
        if self.timed_out {
            return Err(BlogError::Timeout {
                command: command.to_string(),
                timeout,
            });
        }
        if self.exit_code != 0 {
            return Err(BlogError::CommandFailed {
                command: command.to_string(),
                code: self.exit_code,
                stderr: self.diagnostic(),
            });
        }
        Ok(self)
    }
}

/// Human-readable `program arg arg` for logs and error messages.
pub fn command_line(cmd: &Command) -> String {
    let program = cmd
        .get_program()
        .to_string_lossy()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string();
    let mut parts = vec![program];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Map a spawn failure to `ToolNotFound` or an I/O error.
pub fn spawn_error(cmd: &Command, err: io::Error) -> BlogError {
    if err.kind() == io::ErrorKind::NotFound {
        let tool = cmd.get_program().to_string_lossy().into_owned();
        return BlogError::ToolNotFound { tool };
    }
    BlogError::io(format!("spawn {}", command_line(cmd)), err)
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes` bounds the amount of
/// stdout/stderr stored in memory (bytes beyond this are discarded while still draining the pipe).
#[instrument(skip_all, fields(cmd = %command_line(&cmd), timeout_secs = timeout.as_secs()))]
pub fn run_tool(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ToolOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(spawn_error(&cmd, e));
        }
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_handle = thread::spawn(move || match stdout {
        Some(reader) => read_stream_limited(reader, output_limit_bytes),
        None => Ok((Vec::new(), 0)),
    });
    let stderr_handle = thread::spawn(move || match stderr {
        Some(reader) => read_stream_limited(reader, output_limit_bytes),
        None => Ok((Vec::new(), 0)),
    });

    // The writer runs beside the wait so a child that never reads its input
    // still hits the timeout. Killing the child breaks the pipe and ends it.
    let stdin_handle = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut child_stdin)) => {
            let input = input.to_vec();
            Some(thread::spawn(move || {
                // A child that exits without reading its input closes the pipe;
                // that is not our failure to report.
                if let Err(e) = child_stdin.write_all(&input) {
                    debug!(err = %e, "child stdin closed early");
                }
            }))
        }
        _ => None,
    };

    let mut timed_out = false;
    let status = match child
        .wait_timeout(timeout)
        .map_err(|e| BlogError::io("wait for command", e))?
    {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child
                .kill()
                .map_err(|e| BlogError::io("kill command", e))?;
            child
                .wait()
                .map_err(|e| BlogError::io("wait command after kill", e))?
        }
    };

    if let Some(handle) = stdin_handle
        && handle.join().is_err()
    {
        warn!("stdin writer thread panicked");
    }
    let (stdout, stdout_truncated) = join_output(stdout_handle)?;
    let (stderr, stderr_truncated) = join_output(stderr_handle)?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    let exit_code = status.code().unwrap_or(-1);
    debug!(exit_code, timed_out, "command finished");
    Ok(ToolOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<io::Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result.map_err(|e| BlogError::io("read command output", e)),
        Err(_) => Err(BlogError::io(
            "read command output",
            io::Error::other("output reader thread panicked"),
        )),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
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

/// Bounded buffer filled by a background reader of a long-lived child.
///
/// Unlike [`run_tool`], the owner never joins the reader: it snapshots whatever
/// arrived so far.
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputCapture {
    /// Drain `reader` on a background thread, keeping the first `limit` bytes.
    ///
    /// The thread ends at EOF, i.e. once the child (and anything it spawned)
    /// closed the pipe.
    pub fn drain<R: Read + Send + 'static>(&self, mut reader: R, limit: usize) -> thread::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let Ok(mut buf) = inner.lock() else { break };
                        let keep = n.min(limit.saturating_sub(buf.len()));
                        buf.extend_from_slice(&chunk[..keep]);
                    }
                }
            }
        })
    }

    pub fn snapshot(&self) -> String {
        match self.inner.lock() {
            Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => String::new(),
        }
    }
}
