//! Transfer execution engine.
//!
//! Runs uploads and downloads through an external copy tool (`ossutil`),
//! bounding how many run at once, supervising each tool process and turning
//! its loosely structured output into [`TransferUpdate`] snapshots.
//!
//! # Pipeline
//!
//! 1. **Dispatch**: validate the request, emit a `queued` snapshot, spawn a job
//! 2. **Admission**: wait for a [`TransferLimiter`] slot
//! 3. **Supervise**: start the tool (falling back to the discovered binary),
//!    split both output streams into lines
//! 4. **Parse**: extract byte counts, percentages and speeds; keep the rest
//!    as a diagnostic tail
//! 5. **Report**: throttle progress snapshots, emit a terminal snapshot
//!
//! [`TransferUpdate`]: walioss_protocol::TransferUpdate

mod discovery;
mod dispatcher;
mod job;
mod limiter;
mod lines;
mod parser;
mod progress;
mod supervisor;
mod tail;
mod tool;
mod validation;

use std::process::ExitStatus;
use std::time::Duration;

use walioss_protocol::TransferKind;

pub use discovery::{DEFAULT_BINARY, discover_default_binary, discover_in};
pub use dispatcher::{EventSink, TransferDispatcher};
pub use limiter::{TransferLimiter, TransferPermit};
pub use lines::{LineSplitter, read_lines};
pub use parser::{OssutilProgressParser, ParsedProgress, ProgressLineParser, speed_to_bps, strip_ansi};
pub use progress::{EmitThrottle, ProgressState};
pub use supervisor::{ProcessSupervisor, ToolProcess};
pub use tail::DiagnosticTail;
pub use tool::{Ossutil, TransferJob, TransferTool};
pub use validation::{TransferTarget, prepare_download, prepare_upload};

/// Bytes requested per read from a tool output stream.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Capacity of the per-job diagnostic tail: 16 KiB.
pub const DEFAULT_TAIL_CAPACITY: usize = 16 * 1024;

/// Minimum spacing between throttled progress snapshots.
pub const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_millis(250);

/// Lines buffered between the stream readers and the aggregation loop.
pub const LINE_CHANNEL_CAPACITY: usize = 128;

/// Errors produced by the transfer engine.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("{0}")]
    Validation(String),

    /// The tool binary could not be started. `binary` is the path that was
    /// tried last.
    #[error("failed to start {tool}: {source}", tool = DEFAULT_BINARY)]
    ProcessStart {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", exit_message(.status, .tail))]
    ProcessExit { status: ExitStatus, tail: String },

    #[error("{tool} cannot run {kind} transfers")]
    UnsupportedKind { tool: String, kind: TransferKind },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer cancelled")]
    Cancelled,
}

impl TransferError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

fn exit_message(status: &ExitStatus, tail: &str) -> String {
    if tail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {tail}")
    }
}

/// Current wall-clock time in Unix milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn exit_error_includes_tail() {
        use std::os::unix::process::ExitStatusExt;

        let err = TransferError::ProcessExit {
            status: ExitStatus::from_raw(1 << 8),
            tail: "Error: oss: service returned error: StatusCode=403".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("exit status: 1: "), "{msg}");
        assert!(msg.ends_with("StatusCode=403"));
    }

    #[cfg(unix)]
    #[test]
    fn exit_error_without_tail() {
        use std::os::unix::process::ExitStatusExt;

        let err = TransferError::ProcessExit {
            status: ExitStatus::from_raw(2 << 8),
            tail: String::new(),
        };
        assert_eq!(err.to_string(), "exit status: 2");
    }

    #[test]
    fn start_error_names_tool() {
        let err = TransferError::ProcessStart {
            binary: "/opt/walioss/bin/ossutil-1.7".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to start ossutil: "), "{err}");
    }
}
