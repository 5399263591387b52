fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use walioss_protocol::{
        AppSettings, OssConfig, ToolStatus, TransferKind, TransferStatus, TransferUpdate,
    };

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes numbers so that `65` and `65.0` compare equal.
    ///
    /// The desktop UI emits whole-number speeds without a fraction; `f64`
    /// fields serialize with one.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it and compares the JSON values.
    fn roundtrip<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- Transfer snapshots ---

    #[test]
    fn fixture_transfer_update_queued() {
        let u: TransferUpdate = roundtrip("transfer_update_queued.json");
        assert_eq!(u.kind, TransferKind::Upload);
        assert_eq!(u.status, TransferStatus::Queued);
        assert_eq!(u.done_bytes, 0);
        assert_eq!(u.started_at_ms, 0);
    }

    #[test]
    fn fixture_transfer_update_in_progress() {
        let u: TransferUpdate = roundtrip("transfer_update_in_progress.json");
        assert_eq!(u.status, TransferStatus::InProgress);
        assert_eq!(u.percentage(), 50.0);
        assert_eq!(u.speed_bytes_per_sec, 262144.0);
    }

    #[test]
    fn fixture_transfer_update_download_error() {
        let u: TransferUpdate = roundtrip("transfer_update_download_error.json");
        assert_eq!(u.kind, TransferKind::Download);
        assert!(u.status.is_terminal());
        assert_eq!(u.total_bytes, 0);
        assert!(u.message.contains("AccessDenied"));
    }

    #[test]
    fn queued_snapshot_matches_fixture_shape() {
        let built = TransferUpdate::queued(
            "tr-1718000000000-1".into(),
            TransferKind::Upload,
            "report.pdf".into(),
            "media".into(),
            "docs/report.pdf".into(),
            "/home/alice/report.pdf".into(),
            1048576,
            1718000000000,
        );
        assert_eq!(
            serde_json::to_value(&built).unwrap(),
            load_fixture("transfer_update_queued.json")
        );
    }

    // --- Settings ---

    #[test]
    fn fixture_app_settings() {
        let s: AppSettings = roundtrip("app_settings.json");
        assert!(s.default_endpoint.is_empty());
    }

    #[test]
    fn fixture_oss_config() {
        let c: OssConfig = roundtrip("oss_config.json");
        assert_eq!(c.normalized_region(), "cn-hangzhou");
    }

    #[test]
    fn fixture_tool_status() {
        let s: ToolStatus = roundtrip("tool_status.json");
        assert!(s.success);
    }
}
