use std::sync::Arc;

use gatehouse::application::evaluation::{RolloutOptions, RolloutService};
use gatehouse::cache::{KeyValueStore, MemoryStore};
use gatehouse::config::{BackendSettings, RolloutSettings};
use gatehouse::domain::{IdentityInput, build_from_value};
use gatehouse::infra::backends::{LocalDocument, SNAPSHOT_KEY, build_backend};
use serde_json::json;
use tempfile::TempDir;

fn write_overrides(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("overrides.toml");
    std::fs::write(
        &path,
        r#"
[gates]
new_checkout = true

[configs.ui_settings]
header_color = "blue"

[user_configs.vip.ui_settings]
header_color = "gold"
"#,
    )
    .expect("write overrides");
    path
}

fn settings(overrides_file: Option<std::path::PathBuf>) -> RolloutSettings {
    RolloutSettings {
        server_secret: "secret".to_string(),
        environment: "development".to_string(),
        backend: BackendSettings::Local { overrides_file },
    }
}

#[tokio::test]
async fn overrides_file_drives_evaluations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let backend = build_backend(&settings(Some(write_overrides(&dir))))
        .await
        .expect("backend");

    let rollout = RolloutService::new(RolloutOptions::new("secret"), backend);
    rollout.initialize().await.expect("initialize");

    assert!(rollout.check_gate("new_checkout", None).await.expect("gate"));

    let vip = IdentityInput::try_from(json!({ "id": "vip" })).expect("identity input");
    let color = rollout
        .get_config("ui_settings", Some(vip), Some("header_color"))
        .await
        .expect("config");
    assert_eq!(color, Some(json!("gold")));

    let canonical = build_from_value(json!("someone")).expect("identity");
    let color = rollout
        .get_config("ui_settings", Some(canonical.into()), Some("header_color"))
        .await
        .expect("config");
    assert_eq!(color, Some(json!("blue")));
}

#[tokio::test]
async fn missing_overrides_file_fails_backend_construction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = build_backend(&settings(Some(dir.path().join("absent.toml")))).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn cache_store_receives_snapshot_and_bootstraps_next_instance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(MemoryStore::new());

    let first = RolloutService::new(
        RolloutOptions::new("secret"),
        build_backend(&settings(Some(write_overrides(&dir))))
            .await
            .expect("backend"),
    )
    .with_cache(store.clone());
    first.initialize().await.expect("initialize");
    first.shutdown().await.expect("shutdown");

    let snapshot = store
        .get(SNAPSHOT_KEY)
        .await
        .expect("store read")
        .expect("snapshot stored");
    let document: LocalDocument = serde_json::from_str(&snapshot).expect("snapshot decodes");
    assert_eq!(document.gates.get("new_checkout"), Some(&true));

    // No overrides file: everything comes from the stored snapshot.
    let second = RolloutService::new(
        RolloutOptions::new("secret"),
        build_backend(&settings(None)).await.expect("backend"),
    )
    .with_cache(store);
    second.initialize().await.expect("initialize");
    assert!(second.check_gate("new_checkout", None).await.expect("gate"));
}
