//! Execution of one admitted transfer, from slot acquisition to the
//! terminal snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use walioss_protocol::{OssConfig, TransferStatus, TransferUpdate};

use crate::dispatcher::EventSink;
use crate::limiter::TransferLimiter;
use crate::progress::{EmitThrottle, ProgressState};
use crate::supervisor::ProcessSupervisor;
use crate::tool::{TransferJob, TransferTool};
use crate::{TransferError, now_ms};

/// Cancellation handles of transfers that have not finished, by id.
pub(crate) type JobRegistry = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// Shared collaborators a job runs against.
#[derive(Clone)]
pub(crate) struct JobContext {
    pub limiter: Arc<TransferLimiter>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub tool: Arc<dyn TransferTool>,
    pub sink: Arc<dyn EventSink>,
    pub emit_interval: Duration,
    pub jobs: JobRegistry,
}

/// Runs a queued transfer to completion. Every failure ends up in the
/// terminal snapshot; nothing is returned.
pub(crate) async fn run_job(
    ctx: JobContext,
    config: OssConfig,
    mut update: TransferUpdate,
    cancel: CancellationToken,
) {
    let mut progress = ProgressState::new(update.total_bytes);
    let mut throttle = EmitThrottle::new(ctx.emit_interval);

    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            finish(&ctx, &mut update, &mut progress, Err(TransferError::Cancelled));
            return;
        }
        permit = ctx.limiter.acquire() => permit,
    };

    update.status = TransferStatus::InProgress;
    update.started_at_ms = stamp(&mut update);
    throttle.should_emit(Instant::now(), true);
    ctx.sink.emit(update.clone());
    info!(id = %update.id, kind = %update.kind, key = %update.key, "transfer started");

    let result = execute(&ctx, &config, &mut update, &mut progress, &mut throttle, &cancel).await;
    finish(&ctx, &mut update, &mut progress, result);
}

async fn execute(
    ctx: &JobContext,
    config: &OssConfig,
    update: &mut TransferUpdate,
    progress: &mut ProgressState,
    throttle: &mut EmitThrottle,
    cancel: &CancellationToken,
) -> Result<(), TransferError> {
    let args = ctx.tool.copy_args(&TransferJob {
        kind: update.kind,
        bucket: &update.bucket,
        key: &update.key,
        local_path: &update.local_path,
        config,
    })?;

    let sink = &ctx.sink;
    ctx.supervisor
        .run(&args, ctx.tool.parser(), cancel, |parsed| {
            progress.apply(&parsed);
            if throttle.should_emit(Instant::now(), false) {
                progress.write_to(update);
                stamp(update);
                sink.emit(update.clone());
            }
        })
        .await
}

/// Applies the outcome and emits the terminal snapshot, bypassing the throttle.
///
/// The job leaves the registry first, so once a consumer sees the terminal
/// snapshot the id can no longer be cancelled.
fn finish(
    ctx: &JobContext,
    update: &mut TransferUpdate,
    progress: &mut ProgressState,
    result: Result<(), TransferError>,
) {
    let now = stamp(update);
    update.finished_at_ms = now;

    match result {
        Ok(()) => {
            progress.complete();
            progress.write_to(update);
            update.status = TransferStatus::Success;
            info!(
                id = %update.id,
                bytes = progress.done_bytes(),
                speed = progress.speed_bps(),
                "transfer finished"
            );
        }
        Err(err) => {
            progress.write_to(update);
            update.status = TransferStatus::Error;
            update.message = err.to_string();
            error!(id = %update.id, bytes = progress.done_bytes(), error = %err, "transfer failed");
        }
    }
    update.eta_seconds = 0;
    ctx.jobs.lock().unwrap().remove(&update.id);
    ctx.sink.emit(update.clone());
}

/// Advances `updated_at_ms` to now without letting it go backwards.
fn stamp(update: &mut TransferUpdate) -> i64 {
    let now = now_ms().max(update.updated_at_ms);
    update.updated_at_ms = now;
    now
}
