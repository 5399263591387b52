//! External copy tools and how to invoke them.

use walioss_protocol::{OssConfig, TransferKind};

use crate::TransferError;
use crate::parser::{OssutilProgressParser, ProgressLineParser};

/// Everything a tool needs to build one copy command.
#[derive(Debug, Clone, Copy)]
pub struct TransferJob<'a> {
    pub kind: TransferKind,
    pub bucket: &'a str,
    pub key: &'a str,
    pub local_path: &'a str,
    pub config: &'a OssConfig,
}

/// A command-line tool that performs the byte transfer.
///
/// Adding a backend means implementing this trait; the supervisor and the
/// job loop never look at tool-specific arguments or output.
pub trait TransferTool: Send + Sync {
    /// Human-readable tool name, used in logs and errors.
    fn name(&self) -> &str;

    /// Arguments (without the program) for one copy.
    ///
    /// Returns [`TransferError::UnsupportedKind`] when the tool cannot run
    /// this kind of transfer.
    fn copy_args(&self, job: &TransferJob<'_>) -> Result<Vec<String>, TransferError>;

    /// Arguments printing the tool version, used by installation checks.
    fn version_args(&self) -> Vec<String>;

    /// Parser for this tool's progress output.
    fn parser(&self) -> &dyn ProgressLineParser;
}

/// Alibaba Cloud `ossutil`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ossutil {
    parser: OssutilProgressParser,
}

impl Ossutil {
    pub const SCHEME: &'static str = "oss";

    pub fn new() -> Self {
        Self::default()
    }

    /// Remote locator `oss://bucket/key`.
    pub fn remote_url(bucket: &str, key: &str) -> String {
        format!("{}://{bucket}/{key}", Self::SCHEME)
    }
}

impl TransferTool for Ossutil {
    fn name(&self) -> &str {
        "ossutil"
    }

    fn copy_args(&self, job: &TransferJob<'_>) -> Result<Vec<String>, TransferError> {
        let remote = Self::remote_url(job.bucket, job.key);
        let local = job.local_path.to_string();
        let (source, destination) = match job.kind {
            TransferKind::Upload => (local, remote),
            TransferKind::Download => (remote, local),
        };

        let mut args = vec![
            "cp".to_string(),
            source,
            destination,
            "--access-key-id".to_string(),
            job.config.access_key_id.clone(),
            "--access-key-secret".to_string(),
            job.config.access_key_secret.clone(),
            "--region".to_string(),
            job.config.normalized_region(),
            "-f".to_string(),
        ];

        let endpoint = job.config.normalized_endpoint();
        if !endpoint.is_empty() {
            args.push("--endpoint".to_string());
            args.push(endpoint);
        }
        Ok(args)
    }

    fn version_args(&self) -> Vec<String> {
        vec!["version".to_string()]
    }

    fn parser(&self) -> &dyn ProgressLineParser {
        &self.parser
    }
}
