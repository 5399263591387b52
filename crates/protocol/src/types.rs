use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload"),
            Self::Download => f.write_str("download"),
        }
    }
}

/// Lifecycle state of a transfer.
///
/// Variants are declared in lifecycle order, so `Ord` reflects progression:
/// a record's status never compares lower than a previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
}

impl TransferStatus {
    /// Returns `true` for `Success` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Snapshot of one transfer at a point in time.
///
/// Zero counters, zero timestamps and empty strings are omitted from the
/// JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransferKind,
    pub status: TransferStatus,
    pub name: String,
    pub bucket: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_path: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub total_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub done_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub speed_bytes_per_sec: f64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub eta_seconds: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub started_at_ms: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub updated_at_ms: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub finished_at_ms: i64,
}

impl TransferUpdate {
    /// Creates a queued record with no progress.
    #[allow(clippy::too_many_arguments)]
    pub fn queued(
        id: String,
        kind: TransferKind,
        name: String,
        bucket: String,
        key: String,
        local_path: String,
        total_bytes: u64,
        now_ms: i64,
    ) -> Self {
        Self {
            id,
            kind,
            status: TransferStatus::Queued,
            name,
            bucket,
            key,
            local_path,
            total_bytes,
            done_bytes: 0,
            speed_bytes_per_sec: 0.0,
            eta_seconds: 0,
            message: String::new(),
            started_at_ms: 0,
            updated_at_ms: now_ms,
            finished_at_ms: 0,
        }
    }

    /// Returns progress as a percentage (0-100), or 0 when the size is unknown.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.done_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Result of probing the external tool (`ossutil version`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub success: bool,
    pub message: String,
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}
