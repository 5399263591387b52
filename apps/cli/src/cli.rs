//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Overrides;

/// Queue uploads and downloads to Alibaba Cloud OSS through ossutil.
///
/// Every transfer snapshot is printed to stdout as one JSON object per line.
/// Logs go to stderr and are filtered with `RUST_LOG`.
#[derive(Parser, Debug)]
#[command(name = "walioss")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the ossutil binary, overriding the configuration.
    #[arg(long, global = true)]
    pub ossutil: Option<String>,

    /// Maximum number of transfers running at once.
    #[arg(long, short = 'j', global = true)]
    pub max_transfers: Option<usize>,

    #[arg(long, env = "OSS_ACCESS_KEY_ID", hide_env_values = true, global = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "OSS_ACCESS_KEY_SECRET", hide_env_values = true, global = true)]
    pub access_key_secret: Option<String>,

    /// Region id, e.g. `cn-hangzhou` (an `oss-` prefix is accepted).
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Endpoint host or URL.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload local files into a bucket.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(long, short)]
        bucket: String,

        /// Key prefix ("folder") inside the bucket.
        #[arg(long, short, default_value = "")]
        prefix: String,
    },

    /// Download one object to a local path.
    Download {
        /// Object key.
        key: String,

        /// Destination file.
        dest: String,

        #[arg(long, short)]
        bucket: String,

        /// Object size in bytes, used for percentage progress.
        #[arg(long, default_value_t = 0)]
        size: u64,
    },

    /// Check that ossutil can be started and print its version.
    Check,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            access_key_id: self.access_key_id.clone(),
            access_key_secret: self.access_key_secret.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}
