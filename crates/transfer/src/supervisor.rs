//! Tool process lifecycle: binary selection, spawning, output pumping, exit.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::{DEFAULT_BINARY, discover_default_binary};
use crate::lines::read_lines;
use crate::parser::{ParsedProgress, ProgressLineParser, strip_ansi};
use crate::tail::DiagnosticTail;
use crate::{DEFAULT_TAIL_CAPACITY, LINE_CHANNEL_CAPACITY, TransferError};

/// A started tool process with both output streams captured.
#[derive(Debug)]
pub struct ToolProcess {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    /// The binary that actually started.
    pub binary: String,
}

/// Starts and supervises tool processes.
///
/// Holds the binary preference shared by all jobs: a primary path (user
/// configured) and a fallback discovered at startup. When the primary
/// cannot be started at all, the fallback is tried once and, if it starts,
/// becomes the primary for later jobs. A process that starts and then fails
/// is never retried.
#[derive(Debug)]
pub struct ProcessSupervisor {
    primary: Mutex<String>,
    fallback: String,
}

impl ProcessSupervisor {
    /// Creates a supervisor. A blank `configured` path means "use the fallback".
    pub fn new(configured: &str, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into().trim().to_string();
        let configured = configured.trim();
        let primary = if configured.is_empty() {
            fallback.clone()
        } else {
            configured.to_string()
        };
        Self {
            primary: Mutex::new(primary),
            fallback,
        }
    }

    /// Creates a supervisor whose fallback is auto-discovered.
    pub fn with_discovered_fallback(configured: &str) -> Self {
        Self::new(configured, discover_default_binary())
    }

    /// Sets the primary binary. A blank path reverts to the fallback.
    pub fn set_primary(&self, path: &str) {
        let path = path.trim();
        let mut primary = self.primary.lock().unwrap();
        *primary = if path.is_empty() {
            self.fallback.clone()
        } else {
            path.to_string()
        };
    }

    /// The binary the next job will try first.
    pub fn primary(&self) -> String {
        self.primary.lock().unwrap().clone()
    }

    /// The auto-discovered binary.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    fn candidates(&self) -> (String, String) {
        let mut primary = self.primary.lock().unwrap().trim().to_string();
        if primary.is_empty() {
            primary = self.fallback.clone();
        }
        if primary.is_empty() {
            primary = DEFAULT_BINARY.to_string();
        }
        (primary, self.fallback.clone())
    }

    /// Starts the tool with `args`, applying the fallback policy.
    pub fn spawn(&self, args: &[String]) -> Result<ToolProcess, TransferError> {
        let (primary, fallback) = self.candidates();

        let err = match start(&primary, args) {
            Ok(process) => return Ok(process),
            Err(err) => err,
        };
        if !is_start_failure(&err) || fallback.is_empty() || fallback == primary {
            warn!(binary = %primary, error = %err, "tool could not start");
            return Err(TransferError::ProcessStart {
                binary: primary,
                source: err,
            });
        }

        warn!(
            binary = %primary,
            fallback = %fallback,
            error = %err,
            "configured binary could not start, trying fallback"
        );
        match start(&fallback, args) {
            Ok(process) => {
                *self.primary.lock().unwrap() = fallback.clone();
                info!(binary = %fallback, "switched to fallback binary");
                Ok(process)
            }
            Err(source) => {
                warn!(binary = %fallback, error = %source, "fallback binary could not start");
                Err(TransferError::ProcessStart {
                    binary: fallback,
                    source,
                })
            }
        }
    }

    /// Runs the tool to completion, feeding progress lines to `on_progress`.
    ///
    /// Lines the parser does not recognize go into a diagnostic tail that is
    /// attached to the error on non-zero exit. Stdout, stderr and the exit
    /// wait are driven concurrently. Cancelling `cancel` kills the process.
    pub async fn run<F>(
        &self,
        args: &[String],
        parser: &dyn ProgressLineParser,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<(), TransferError>
    where
        F: FnMut(ParsedProgress) + Send,
    {
        let ToolProcess {
            child,
            stdout,
            stderr,
            binary,
        } = self.spawn(args)?;
        debug!(binary = %binary, pid = ?child.id(), "tool process started");

        let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let stdout_reader = tokio::spawn(read_lines(stdout, tx.clone()));
        let stderr_reader = tokio::spawn(read_lines(stderr, tx));
        let waiter = tokio::spawn(wait_or_kill(child, cancel.clone()));

        let mut tail = DiagnosticTail::new(DEFAULT_TAIL_CAPACITY);
        let mut cancelled = false;
        loop {
            // Grandchildren of a wrapper script can hold the pipes open after
            // the tool itself is killed, so stop draining on cancel.
            let line = tokio::select! {
                line = rx.recv() => line,
                _ = cancel.cancelled() => {
                    cancelled = true;
                    None
                }
            };
            let Some(line) = line else { break };

            let parsed = parser.parse(&line);
            if parsed.is_progress() {
                on_progress(parsed);
            } else {
                tail.append_line(strip_ansi(&line).trim());
            }
        }

        for (stream, reader) in [("stdout", stdout_reader), ("stderr", stderr_reader)] {
            if cancelled {
                reader.abort();
            }
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(stream, error = %e, "reading tool output failed"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!(stream, error = %e, "output reader task failed"),
            }
        }

        let status = match waiter.await {
            Ok(Ok(Some(status))) => status,
            Ok(Ok(None)) => return Err(TransferError::Cancelled),
            Ok(Err(e)) => return Err(TransferError::Io(e)),
            Err(e) => return Err(TransferError::Io(io::Error::other(e))),
        };

        debug!(binary = %binary, %status, "tool process exited");
        if status.success() {
            Ok(())
        } else {
            Err(TransferError::ProcessExit {
                status,
                tail: tail.snapshot(),
            })
        }
    }

    /// Runs the tool and returns its combined stdout and stderr, trimmed.
    pub async fn output(&self, args: &[String]) -> Result<String, TransferError> {
        let ToolProcess {
            mut child,
            mut stdout,
            mut stderr,
            ..
        } = self.spawn(args)?;

        let mut out = Vec::new();
        let mut err = Vec::new();
        let (read_out, read_err, status) = tokio::join!(
            stdout.read_to_end(&mut out),
            stderr.read_to_end(&mut err),
            child.wait()
        );
        read_out?;
        read_err?;
        let status = status?;

        out.extend_from_slice(&err);
        let text = String::from_utf8_lossy(&out).trim().to_string();
        if status.success() {
            Ok(text)
        } else {
            Err(TransferError::ProcessExit { status, tail: text })
        }
    }
}

/// Whether `err` means the binary could not be started at all.
pub(crate) fn is_start_failure(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

fn start(binary: &str, args: &[String]) -> io::Result<ToolProcess> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr not captured"))?;

    Ok(ToolProcess {
        child,
        stdout,
        stderr,
        binary: binary.to_string(),
    })
}

/// Waits for exit, or kills the process when cancelled (`Ok(None)`).
///
/// An exit that is already observable wins over a concurrent cancel.
async fn wait_or_kill(mut child: Child, cancel: CancellationToken) -> io::Result<Option<ExitStatus>> {
    tokio::select! {
        biased;
        status = child.wait() => return status.map(Some),
        _ = cancel.cancelled() => {}
    }
    child.kill().await?;
    Ok(None)
}
