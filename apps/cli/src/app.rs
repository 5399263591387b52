//! Main CLI application logic.

use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use walioss_protocol::{OssConfig, TransferStatus, TransferUpdate};
use walioss_transfer::{ProcessSupervisor, TransferDispatcher};

use crate::cli::{Cli, Command};
use crate::config::Config;

/// Runs one CLI invocation. Returns `true` when every transfer succeeded.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<bool> {
    let tool_path = cli.ossutil.clone().unwrap_or_else(|| config.ossutil_path.clone());
    let supervisor = Arc::new(ProcessSupervisor::with_discovered_fallback(&tool_path));
    info!(
        primary = %supervisor.primary(),
        fallback = %supervisor.fallback(),
        "tool binary resolved"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let sink = move |update: TransferUpdate| {
        let _ = tx.send(update);
    };
    let max = cli.max_transfers.unwrap_or(config.max_transfers);
    let dispatcher = TransferDispatcher::new(sink, supervisor, max);
    let oss = config.oss_config(&cli.overrides());

    let ids = match &cli.command {
        Command::Check => {
            let status = dispatcher.check_tool_installed().await;
            println!("{}", serde_json::to_string(&status)?);
            return Ok(status.success);
        }
        Command::Upload {
            files,
            bucket,
            prefix,
        } => {
            check_credentials(&oss)?;
            let mut ids = Vec::with_capacity(files.len());
            for file in files {
                ids.push(dispatcher.enqueue_upload(&oss, file, bucket, prefix)?);
            }
            ids
        }
        Command::Download {
            key,
            dest,
            bucket,
            size,
        } => {
            check_credentials(&oss)?;
            vec![dispatcher.enqueue_download(&oss, bucket, key, dest, *size)?]
        }
    };

    report(&dispatcher, rx, ids).await
}

fn check_credentials(oss: &OssConfig) -> anyhow::Result<()> {
    if oss.access_key_id.trim().is_empty() || oss.access_key_secret.trim().is_empty() {
        anyhow::bail!(
            "missing credentials: set access_key_id/access_key_secret in the config file \
             or OSS_ACCESS_KEY_ID/OSS_ACCESS_KEY_SECRET"
        );
    }
    Ok(())
}

/// Prints snapshots until every transfer in `ids` has finished.
///
/// Ctrl-C cancels all outstanding transfers.
async fn report(
    dispatcher: &TransferDispatcher,
    mut rx: mpsc::UnboundedReceiver<TransferUpdate>,
    ids: Vec<String>,
) -> anyhow::Result<bool> {
    let mut remaining = ids.len();
    let mut failed = 0usize;
    let mut stdout = std::io::stdout().lock();
    let mut interrupted = false;

    while remaining > 0 {
        let update = tokio::select! {
            update = rx.recv() => match update {
                Some(u) => u,
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                warn!("interrupted, cancelling transfers");
                interrupted = true;
                for id in &ids {
                    dispatcher.cancel(id);
                }
                continue;
            }
        };

        writeln!(stdout, "{}", serde_json::to_string(&update)?)?;
        stdout.flush()?;

        if update.status.is_terminal() {
            remaining -= 1;
            if update.status == TransferStatus::Error {
                failed += 1;
                error!(id = %update.id, name = %update.name, message = %update.message, "transfer failed");
            }
        }
    }

    info!(total = ids.len(), failed, "all transfers finished");
    Ok(failed == 0)
}
