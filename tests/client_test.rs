use serde_json::json;
use tempfile::TempDir;

use slugstash::client;
use slugstash::config::AppConfig;
use slugstash::error::StoreError;

// The shared store is process-wide, so everything lives in one test.
#[tokio::test]
async fn test_shared_store_is_initialized_once() {
    assert!(matches!(client::get(), Err(StoreError::NotInitialized)));

    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let first = client::init(&AppConfig {
        data_dir: Some(first_dir.path().to_path_buf()),
        ..AppConfig::default()
    });
    let second = client::init(&AppConfig {
        data_dir: Some(second_dir.path().to_path_buf()),
        ..AppConfig::default()
    });
    assert!(std::ptr::eq(first, second));
    assert!(std::ptr::eq(first, client::get().unwrap()));

    let receipt = first.upload_json(Some("shared"), json!({"ok": true})).await.unwrap();
    assert_eq!(receipt.slug, "shared");
    assert!(first_dir.path().join("db/jsons/shared.json").is_file());
    assert!(!second_dir.path().join("db").exists());
}
