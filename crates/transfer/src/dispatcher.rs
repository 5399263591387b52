//! Transfer dispatcher: validates requests, allocates records and spawns
//! one job per transfer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walioss_protocol::{OssConfig, ToolStatus, TransferKind, TransferUpdate};

use crate::job::{JobContext, JobRegistry, run_job};
use crate::limiter::TransferLimiter;
use crate::supervisor::ProcessSupervisor;
use crate::tool::{Ossutil, TransferTool};
use crate::validation::{TransferTarget, prepare_download, prepare_upload};
use crate::{DEFAULT_EMIT_INTERVAL, TransferError, now_ms};

/// Receives every snapshot the engine produces.
///
/// Called from job tasks; implementations must return quickly and never
/// block on the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, update: TransferUpdate);
}

impl<F> EventSink for F
where
    F: Fn(TransferUpdate) + Send + Sync,
{
    fn emit(&self, update: TransferUpdate) {
        self(update)
    }
}

/// Entry point for callers: enqueue transfers, tune concurrency, manage the
/// tool binary.
///
/// Must be used from within a tokio runtime; every enqueued transfer runs
/// on its own spawned task.
pub struct TransferDispatcher {
    sink: Arc<dyn EventSink>,
    supervisor: Arc<ProcessSupervisor>,
    limiter: Arc<TransferLimiter>,
    tool: Arc<dyn TransferTool>,
    emit_interval: Duration,
    seq: AtomicU64,
    jobs: JobRegistry,
}

impl TransferDispatcher {
    /// Creates a dispatcher running `ossutil` with at most `max_transfers`
    /// transfers at once (clamped to at least 1).
    pub fn new(
        sink: impl EventSink + 'static,
        supervisor: Arc<ProcessSupervisor>,
        max_transfers: usize,
    ) -> Self {
        Self {
            sink: Arc::new(sink),
            supervisor,
            limiter: Arc::new(TransferLimiter::new(max_transfers)),
            tool: Arc::new(Ossutil::new()),
            emit_interval: DEFAULT_EMIT_INTERVAL,
            seq: AtomicU64::new(0),
            jobs: JobRegistry::default(),
        }
    }

    /// Replaces the copy tool.
    pub fn with_tool(mut self, tool: impl TransferTool + 'static) -> Self {
        self.tool = Arc::new(tool);
        self
    }

    /// Overrides the progress throttle interval.
    pub fn with_emit_interval(mut self, interval: Duration) -> Self {
        self.emit_interval = interval;
        self
    }

    /// Enqueues an upload of `local_path` into `bucket` under `prefix`.
    ///
    /// Returns the transfer id once the queued snapshot has been emitted.
    pub fn enqueue_upload(
        &self,
        config: &OssConfig,
        local_path: &str,
        bucket: &str,
        prefix: &str,
    ) -> Result<String, TransferError> {
        let target = prepare_upload(local_path, bucket, prefix)?;
        Ok(self.enqueue(config, TransferKind::Upload, target))
    }

    /// Enqueues a download of `object` from `bucket` to `local_path`.
    ///
    /// `total_bytes` is a size hint; 0 means unknown.
    pub fn enqueue_download(
        &self,
        config: &OssConfig,
        bucket: &str,
        object: &str,
        local_path: &str,
        total_bytes: u64,
    ) -> Result<String, TransferError> {
        let target = prepare_download(bucket, object, local_path, total_bytes)?;
        Ok(self.enqueue(config, TransferKind::Download, target))
    }

    fn enqueue(&self, config: &OssConfig, kind: TransferKind, target: TransferTarget) -> String {
        let now = now_ms();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("tr-{now}-{seq}");

        let update = TransferUpdate::queued(
            id.clone(),
            kind,
            target.name,
            target.bucket,
            target.key,
            target.local_path,
            target.total_bytes,
            now,
        );
        self.sink.emit(update.clone());
        info!(id = %id, %kind, key = %update.key, "transfer queued");

        let cancel = CancellationToken::new();
        self.jobs.lock().unwrap().insert(id.clone(), cancel.clone());

        let ctx = JobContext {
            limiter: Arc::clone(&self.limiter),
            supervisor: Arc::clone(&self.supervisor),
            tool: Arc::clone(&self.tool),
            sink: Arc::clone(&self.sink),
            emit_interval: self.emit_interval,
            jobs: Arc::clone(&self.jobs),
        };
        tokio::spawn(run_job(ctx, config.clone(), update, cancel));

        id
    }

    /// Requests cancellation of a queued or running transfer.
    ///
    /// Returns `false` when the id is unknown or already finished.
    pub fn cancel(&self, id: &str) -> bool {
        match self.jobs.lock().unwrap().get(id) {
            Some(token) => {
                debug!(id, "cancelling transfer");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of transfers that have not reached a terminal state.
    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Sets the maximum number of concurrently running transfers (at least 1).
    ///
    /// Lowering the limit never interrupts running transfers.
    pub fn set_concurrency_limit(&self, max: usize) {
        self.limiter.set_max(max);
        info!(max = self.limiter.max(), "transfer concurrency limit updated");
    }

    pub fn concurrency_limit(&self) -> usize {
        self.limiter.max()
    }

    /// Sets the tool binary. A blank path reverts to the discovered default.
    pub fn set_tool_path(&self, path: &str) {
        self.supervisor.set_primary(path);
        info!(path = %self.supervisor.primary(), "tool path updated");
    }

    pub fn tool_path(&self) -> String {
        self.supervisor.primary()
    }

    /// Runs the tool's version command to check that it can be started.
    pub async fn check_tool_installed(&self) -> ToolStatus {
        match self.supervisor.output(&self.tool.version_args()).await {
            Ok(message) => ToolStatus {
                success: true,
                message,
            },
            Err(err) => {
                warn!(tool = self.tool.name(), error = %err, "tool check failed");
                ToolStatus {
                    success: false,
                    message: format!(
                        "{} not found or not accessible: {err}",
                        self.tool.name()
                    ),
                }
            }
        }
    }
}
