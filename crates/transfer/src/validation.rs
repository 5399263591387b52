use std::path::Path;

use crate::TransferError;

/// A validated transfer request, ready to become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTarget {
    /// Display name.
    pub name: String,
    pub bucket: String,
    /// Object key on the remote side.
    pub key: String,
    pub local_path: String,
    /// Known size in bytes, 0 when unknown.
    pub total_bytes: u64,
}

/// Validates an upload of one local file into `bucket` under `prefix`.
///
/// Rejects:
/// - Empty local path or bucket
/// - Paths that do not exist or cannot be inspected
/// - Directories and other non-regular files
pub fn prepare_upload(
    local_path: &str,
    bucket: &str,
    prefix: &str,
) -> Result<TransferTarget, TransferError> {
    let local_path = local_path.trim();
    if local_path.is_empty() {
        return Err(TransferError::validation("local path is empty"));
    }
    let bucket = bucket.trim();
    if bucket.is_empty() {
        return Err(TransferError::validation("bucket is empty"));
    }

    let meta = std::fs::metadata(local_path)
        .map_err(|e| TransferError::Validation(format!("stat local file failed: {e}")))?;
    if !meta.is_file() {
        return Err(TransferError::validation(
            "upload currently supports files only",
        ));
    }

    let name = Path::new(local_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| local_path.to_string());

    Ok(TransferTarget {
        key: format!("{}{name}", normalize_prefix(prefix)),
        name,
        bucket: bucket.to_string(),
        local_path: local_path.to_string(),
        total_bytes: meta.len(),
    })
}

/// Validates a download of `object` from `bucket` to `local_path`.
///
/// `total_bytes` is the caller's size hint (0 when unknown).
pub fn prepare_download(
    bucket: &str,
    object: &str,
    local_path: &str,
    total_bytes: u64,
) -> Result<TransferTarget, TransferError> {
    let local_path = local_path.trim();
    let object = object.trim();
    let object = object.strip_prefix('/').unwrap_or(object);
    if local_path.is_empty() {
        return Err(TransferError::validation("local path is empty"));
    }
    let bucket = bucket.trim();
    if bucket.is_empty() {
        return Err(TransferError::validation("bucket is empty"));
    }
    if object.is_empty() {
        return Err(TransferError::validation("object key is empty"));
    }

    Ok(TransferTarget {
        name: object_base_name(object),
        bucket: bucket.to_string(),
        key: object.to_string(),
        local_path: local_path.to_string(),
        total_bytes,
    })
}

/// `"/a/b"` becomes `"a/b/"`; an empty prefix stays empty.
fn normalize_prefix(prefix: &str) -> String {
    let mut prefix = prefix.strip_prefix('/').unwrap_or(prefix).to_string();
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

/// Last path segment of an object key, or the whole key if that is empty or `.`.
fn object_base_name(key: &str) -> String {
    let base = key.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if base.is_empty() || base == "." {
        key.to_string()
    } else {
        base.to_string()
    }
}
