//! End-to-end dispatch tests against a fake `ossutil` shell script.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use walioss_protocol::{OssConfig, TransferStatus, TransferUpdate};
use walioss_transfer::{ProcessSupervisor, TransferDispatcher};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config() -> OssConfig {
    OssConfig {
        access_key_id: "AKID".into(),
        access_key_secret: "SECRET".into(),
        region: "oss-cn-hangzhou".into(),
        endpoint: String::new(),
    }
}

fn dispatcher(
    supervisor: ProcessSupervisor,
    max: usize,
) -> (TransferDispatcher, mpsc::UnboundedReceiver<TransferUpdate>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = move |u: TransferUpdate| {
        let _ = tx.send(u);
    };
    let d = TransferDispatcher::new(sink, Arc::new(supervisor), max)
        .with_emit_interval(Duration::ZERO);
    (d, rx)
}

/// Collects snapshots until `terminals` transfers have finished.
async fn collect(rx: &mut mpsc::UnboundedReceiver<TransferUpdate>, terminals: usize) -> Vec<TransferUpdate> {
    let mut seen = Vec::new();
    let mut done = 0;
    while done < terminals {
        let update = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for snapshots")
            .expect("sink closed");
        if update.status.is_terminal() {
            done += 1;
        }
        seen.push(update);
    }
    seen
}

fn ten_byte_file(dir: &Path) -> String {
    let path = dir.join("hello.txt");
    std::fs::write(&path, b"0123456789").unwrap();
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn upload_reports_queued_progress_success() {
    let tmp = tempfile::tempdir().unwrap();
    let args_file = tmp.path().join("args.txt");
    let tool = script(
        tmp.path(),
        "ossutil",
        &format!(
            "echo \"$@\" > {}\n\
             printf 'Progress: 50%%\\r'\n\
             printf 'OK size: 10, Speed: 1KB/s\\n'",
            args_file.display()
        ),
    );
    let file = ten_byte_file(tmp.path());
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 3);

    let id = d.enqueue_upload(&config(), &file, "b", "p/").unwrap();
    let seen = collect(&mut rx, 1).await;

    assert!(seen.iter().all(|u| u.id == id));
    let first = &seen[0];
    assert_eq!(first.status, TransferStatus::Queued);
    assert_eq!(first.key, "p/hello.txt");
    assert_eq!(first.total_bytes, 10);
    assert_eq!(seen[1].status, TransferStatus::InProgress);
    assert!(seen[1].started_at_ms > 0);

    let last = seen.last().unwrap();
    assert_eq!(last.status, TransferStatus::Success);
    assert_eq!(last.done_bytes, 10);
    assert_eq!(last.total_bytes, 10);
    assert_eq!(last.eta_seconds, 0);
    assert!(last.finished_at_ms >= last.started_at_ms);
    assert!(!d.cancel(&id));
    assert_eq!(d.pending(), 0);

    for pair in seen.windows(2) {
        assert!(pair[0].updated_at_ms <= pair[1].updated_at_ms);
        assert!(pair[0].done_bytes <= pair[1].done_bytes);
    }

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert_eq!(
        args.trim(),
        format!(
            "cp {file} oss://b/p/hello.txt --access-key-id AKID --access-key-secret SECRET --region cn-hangzhou -f"
        )
    );
}

#[tokio::test]
async fn fallback_binary_used_for_later_jobs() {
    let tmp = tempfile::tempdir().unwrap();
    let fallback = script(tmp.path(), "ossutil", "printf 'OK size: 10\\n'");
    let fallback = fallback.to_string_lossy().into_owned();
    let file = ten_byte_file(tmp.path());
    let (d, mut rx) = dispatcher(ProcessSupervisor::new("/nonexistent/ossutil", fallback.clone()), 1);

    d.enqueue_upload(&config(), &file, "b", "").unwrap();
    let first = collect(&mut rx, 1).await;
    assert_eq!(first.last().unwrap().status, TransferStatus::Success);
    assert_eq!(d.tool_path(), fallback);

    d.enqueue_upload(&config(), &file, "b", "").unwrap();
    let second = collect(&mut rx, 1).await;
    assert_eq!(second.last().unwrap().status, TransferStatus::Success);
}

#[tokio::test]
async fn non_zero_exit_carries_diagnostics() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = script(
        tmp.path(),
        "ossutil",
        "printf '\\033[31mError: oss: service returned error: StatusCode=403\\033[0m\\n' >&2\nexit 1",
    );
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 1);

    d.enqueue_download(&config(), "b", "/docs/a.pdf", "/tmp/walioss-a.pdf", 0)
        .unwrap();
    let seen = collect(&mut rx, 1).await;

    let last = seen.last().unwrap();
    assert_eq!(last.status, TransferStatus::Error);
    assert_eq!(last.key, "docs/a.pdf");
    assert_eq!(last.name, "a.pdf");
    assert!(last.message.starts_with("exit status: 1: "), "{}", last.message);
    assert!(last.message.ends_with("StatusCode=403"), "{}", last.message);
}

#[tokio::test]
async fn download_percentage_uses_size_hint() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = script(tmp.path(), "ossutil", "printf 'Progress: 25%%\\n'\nsleep 0.2");
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 1);

    d.enqueue_download(&config(), "b", "big.iso", "/tmp/walioss-big.iso", 400)
        .unwrap();
    let seen = collect(&mut rx, 1).await;

    assert!(seen
        .iter()
        .any(|u| u.status == TransferStatus::InProgress && u.done_bytes == 100));
    assert_eq!(seen.last().unwrap().done_bytes, 400);
}

#[tokio::test]
async fn limit_of_one_runs_jobs_in_turn() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = script(tmp.path(), "ossutil", "sleep 0.1");
    let file = ten_byte_file(tmp.path());
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 1);

    let a = d.enqueue_upload(&config(), &file, "b", "").unwrap();
    let b = d.enqueue_upload(&config(), &file, "b", "").unwrap();
    let seen = collect(&mut rx, 2).await;

    let started: Vec<&str> = seen
        .iter()
        .filter(|u| u.status == TransferStatus::InProgress && u.done_bytes == 0)
        .map(|u| u.id.as_str())
        .collect();
    assert_eq!(started.len(), 2);

    // The second start must come after the first finish.
    let first_start = seen.iter().position(|u| u.status == TransferStatus::InProgress).unwrap();
    let first_id = seen[first_start].id.clone();
    let first_end = seen
        .iter()
        .position(|u| u.id == first_id && u.status.is_terminal())
        .unwrap();
    let other = if first_id == a { &b } else { &a };
    let second_start = seen
        .iter()
        .position(|u| &u.id == other && u.status == TransferStatus::InProgress)
        .unwrap();
    assert!(second_start > first_end);
}

#[tokio::test]
async fn cancel_kills_running_transfer() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = script(tmp.path(), "ossutil", "exec sleep 30");
    let file = ten_byte_file(tmp.path());
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 1);

    let id = d.enqueue_upload(&config(), &file, "b", "").unwrap();
    loop {
        let u = rx.recv().await.unwrap();
        if u.status == TransferStatus::InProgress {
            break;
        }
    }
    assert!(d.cancel(&id));

    let seen = collect(&mut rx, 1).await;
    let last = seen.last().unwrap();
    assert_eq!(last.status, TransferStatus::Error);
    assert_eq!(last.message, "transfer cancelled");
}

#[tokio::test]
async fn cancel_returns_while_wrapper_children_hold_pipes() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = script(tmp.path(), "ossutil", "echo 'starting'\nsleep 20");
    let file = ten_byte_file(tmp.path());
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 1);

    let id = d.enqueue_upload(&config(), &file, "b", "").unwrap();
    loop {
        let u = rx.recv().await.unwrap();
        if u.status == TransferStatus::InProgress {
            break;
        }
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(d.cancel(&id));

    let last = tokio::time::timeout(Duration::from_secs(5), collect(&mut rx, 1))
        .await
        .expect("cancel waited on the orphaned sleep")
        .pop()
        .unwrap();
    assert_eq!(last.status, TransferStatus::Error);
    assert_eq!(last.message, "transfer cancelled");
}

#[tokio::test]
async fn cancel_queued_transfer_skips_admission() {
    let tmp = tempfile::tempdir().unwrap();
    let tool = script(tmp.path(), "ossutil", "exec sleep 30");
    let file = ten_byte_file(tmp.path());
    let (d, mut rx) = dispatcher(ProcessSupervisor::new(tool.to_str().unwrap(), ""), 1);

    let running = d.enqueue_upload(&config(), &file, "b", "").unwrap();
    let queued = d.enqueue_upload(&config(), &file, "b", "").unwrap();
    assert!(d.cancel(&queued));

    let seen = collect(&mut rx, 1).await;
    let last = seen.last().unwrap();
    assert_eq!(last.id, queued);
    assert_eq!(last.message, "transfer cancelled");
    assert!(!seen.iter().any(|u| u.id == queued && u.status == TransferStatus::InProgress));

    assert!(d.cancel(&running));
    collect(&mut rx, 1).await;
}
