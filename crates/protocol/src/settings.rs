//! Connection credentials and application settings.

use serde::{Deserialize, Serialize};

/// Credentials and location of an object-store account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OssConfig {
    pub access_key_id: String,
    pub access_key_secret: String,
    #[serde(default)]
    pub region: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
}

impl OssConfig {
    /// Region with surrounding whitespace and any `oss-` prefix removed.
    pub fn normalized_region(&self) -> String {
        normalize_region(&self.region)
    }

    /// Endpoint reduced to a bare host, or empty when unset.
    pub fn normalized_endpoint(&self) -> String {
        normalize_endpoint(&self.endpoint)
    }
}

/// Application-wide settings.
///
/// An empty `ossutil_path` means "use the auto-discovered binary".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub ossutil_path: String,
    #[serde(default)]
    pub default_region: String,
    #[serde(default)]
    pub default_endpoint: String,
}

/// Normalizes a region id: `" oss-cn-hangzhou "` becomes `"cn-hangzhou"`.
pub fn normalize_region(region: &str) -> String {
    let region = region.trim();
    region.strip_prefix("oss-").unwrap_or(region).to_string()
}

/// Normalizes an endpoint to a bare host.
///
/// Accepts full URLs and strips scheme, path, query, fragment and a trailing
/// dot: `"https://oss-cn-hangzhou.aliyuncs.com/x?y"` becomes
/// `"oss-cn-hangzhou.aliyuncs.com"`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let mut endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return String::new();
    }

    if let Some((_, rest)) = endpoint.split_once("://") {
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        // Userinfo is not part of the host.
        let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
        if !host.is_empty() {
            endpoint = host;
        }
    }

    let end = endpoint.find(['?', '#', '/']).unwrap_or(endpoint.len());
    let endpoint = &endpoint[..end];
    endpoint.strip_suffix('.').unwrap_or(endpoint).to_string()
}
