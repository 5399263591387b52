//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/walioss/config.toml`
//! - Windows: `%APPDATA%/walioss/config.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walioss_protocol::OssConfig;

/// Persistent CLI configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Path to the ossutil binary (empty = auto-discover).
    #[serde(default)]
    pub ossutil_path: String,

    /// Maximum number of transfers running at once.
    #[serde(default = "default_max_transfers")]
    pub max_transfers: usize,

    #[serde(default)]
    pub default_region: String,

    #[serde(default)]
    pub default_endpoint: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub access_key_secret: String,
}

fn default_max_transfers() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ossutil_path: String::new(),
            max_transfers: default_max_transfers(),
            default_region: String::new(),
            default_endpoint: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
        }
    }
}

// Keeps the secret out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("ossutil_path", &self.ossutil_path)
            .field("max_transfers", &self.max_transfers)
            .field("default_region", &self.default_region)
            .field("default_endpoint", &self.default_endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Loads configuration from `path` (or the platform default), creating
    /// a default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Credentials live here; restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Connection credentials, with per-invocation overrides applied.
    pub fn oss_config(&self, overrides: &Overrides) -> OssConfig {
        OssConfig {
            access_key_id: pick(&overrides.access_key_id, &self.access_key_id),
            access_key_secret: pick(&overrides.access_key_secret, &self.access_key_secret),
            region: pick(&overrides.region, &self.default_region),
            endpoint: pick(&overrides.endpoint, &self.default_endpoint),
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

fn pick(over: &Option<String>, base: &str) -> String {
    match over.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => base.to_string(),
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("walioss")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("walioss").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/walioss/config.toml"))
    }
}
