use std::sync::Arc;

use super::*;
use crate::storage::{MemoryObjectStorage, StorageOp};

const BUCKET: &str = "b";

/// テスト用Gatewayを構築するヘルパー
fn test_gateway(environment: &str, temp_dir: &Path) -> (ObjectStoreGateway, Arc<MemoryObjectStorage>) {
    let storage = Arc::new(MemoryObjectStorage::new());
    let config = GatewayConfig::new(BUCKET, environment, temp_dir);
    let gateway = ObjectStoreGateway::new(config, storage.clone()).unwrap();
    (gateway, storage)
}

/// ローカルにソースファイルを作成する
fn write_source(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_new_rejects_missing_bucket() {
    let storage = Arc::new(MemoryObjectStorage::new());
    let result = ObjectStoreGateway::new(GatewayConfig::new("", "qa", "/tmp/"), storage);
    assert!(matches!(
        result,
        Err(GatewayError::Config { field: "bucket_name" })
    ));
}

#[test]
fn test_environment_is_lowercased_once() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, _) = test_gateway("Production", dir.path());
    assert_eq!(gateway.environment(), "production");
    assert_eq!(gateway.full_key("a.png"), "production/a.png");
}

#[tokio::test]
async fn test_upload_sends_namespaced_key_without_acl() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "a.png", b"\x89PNG");
    let (gateway, storage) = test_gateway("Production", dir.path());

    let url = gateway.upload("images/a.png", &source).await.unwrap();
    assert_eq!(url, "memory://b/production/images/a.png");

    let puts = storage.calls_of(StorageOp::Put);
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].bucket, BUCKET);
    assert_eq!(puts[0].key, "production/images/a.png");

    let object = storage.object(BUCKET, "production/images/a.png").unwrap();
    assert_eq!(object.acl, None);
    assert_eq!(object.content_type, "image/png");
    assert_eq!(object.body, b"\x89PNG");
}

#[tokio::test]
async fn test_upload_public_access_sets_public_read() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "doc.txt", b"hello");
    let storage = Arc::new(MemoryObjectStorage::new());
    let mut config = GatewayConfig::new(BUCKET, "qa", dir.path());
    config.public_access = true;
    let gateway = ObjectStoreGateway::new(config, storage.clone()).unwrap();

    gateway.upload("doc.txt", &source).await.unwrap();

    let object = storage.object(BUCKET, "qa/doc.txt").unwrap();
    assert_eq!(object.acl, Some(ObjectAcl::PublicRead));
    assert_eq!(object.content_type, "text/plain");
}

#[tokio::test]
async fn test_upload_unknown_extension_is_octet_stream() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "blob", b"\x00\x01");
    let (gateway, storage) = test_gateway("qa", dir.path());

    gateway.upload("blob", &source).await.unwrap();
    assert_eq!(
        storage.object(BUCKET, "qa/blob").unwrap().content_type,
        "application/octet-stream"
    );
}

#[tokio::test]
async fn test_upload_unreadable_source_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());

    let err = gateway
        .upload("a.png", dir.path().join("missing.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Io { .. }));
    // 読み込み失敗時はプロバイダを一切呼ばない
    assert!(storage.calls().is_empty());
}

#[tokio::test]
async fn test_upload_existing_key_conflicts_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "a.png", b"new");
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/a.png", b"old".to_vec());

    let err = gateway.upload("a.png", &source).await.unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(ref k) if k == "qa/a.png"));
    assert!(!storage.has_mutations());
    assert_eq!(storage.object(BUCKET, "qa/a.png").unwrap().body, b"old");
}

#[tokio::test]
async fn test_upload_delete_upload_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "a.png", b"data");
    let (gateway, _) = test_gateway("qa", dir.path());

    gateway.upload("a.png", &source).await.unwrap();
    assert_eq!(
        gateway.delete("a.png").await.unwrap(),
        DeleteOutcome::Deleted {
            delete_marker: false
        }
    );
    gateway.upload("a.png", &source).await.unwrap();
    assert!(gateway.exists("a.png").await.unwrap());
}

#[tokio::test]
async fn test_upload_provider_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "a.png", b"data");
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.fail_on(StorageOp::Put);

    let err = gateway.upload("a.png", &source).await.unwrap_err();
    assert!(matches!(err, GatewayError::Provider(_)));
    // リトライしない
    assert_eq!(storage.calls_of(StorageOp::Put).len(), 1);
}

/// 異なる環境のGatewayは同じ論理キーでも衝突しない
#[tokio::test]
async fn test_environments_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "a.png", b"data");
    let storage = Arc::new(MemoryObjectStorage::new());
    let qa = ObjectStoreGateway::new(GatewayConfig::new(BUCKET, "QA", dir.path()), storage.clone())
        .unwrap();
    let prod = ObjectStoreGateway::new(
        GatewayConfig::new(BUCKET, "production", dir.path()),
        storage.clone(),
    )
    .unwrap();

    qa.upload("a.png", &source).await.unwrap();
    prod.upload("a.png", &source).await.unwrap();

    assert!(storage.object(BUCKET, "qa/a.png").is_some());
    assert!(storage.object(BUCKET, "production/a.png").is_some());

    qa.delete("a.png").await.unwrap();
    assert!(!qa.exists("a.png").await.unwrap());
    assert!(prod.exists("a.png").await.unwrap());
}

#[tokio::test]
async fn test_move_copies_then_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("production", dir.path());
    storage.insert(BUCKET, "production/a.png", b"img".to_vec());

    let url = gateway.move_object("a.png", "b.png").await.unwrap();
    assert_eq!(url, "memory://b/production/b.png");

    assert!(storage.object(BUCKET, "production/a.png").is_none());
    assert_eq!(storage.object(BUCKET, "production/b.png").unwrap().body, b"img");

    let ops: Vec<StorageOp> = storage.calls().iter().map(|c| c.op).collect();
    assert_eq!(ops, vec![StorageOp::Exists, StorageOp::Copy, StorageOp::Delete]);
}

#[tokio::test]
async fn test_move_missing_source_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("production", dir.path());

    let err = gateway.move_object("a.png", "b.png").await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(ref k) if k == "production/a.png"));
    assert!(storage.calls_of(StorageOp::Copy).is_empty());
    assert!(storage.calls_of(StorageOp::Delete).is_empty());
}

#[tokio::test]
async fn test_move_delete_failure_is_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/a.png", b"img".to_vec());
    storage.fail_on(StorageOp::Delete);

    let err = gateway.move_object("a.png", "b.png").await.unwrap_err();
    match err {
        GatewayError::MoveIncomplete {
            source_key,
            destination_key,
            copied_url,
            ..
        } => {
            assert_eq!(source_key, "qa/a.png");
            assert_eq!(destination_key, "qa/b.png");
            assert_eq!(copied_url, "memory://b/qa/b.png");
        }
        other => panic!("MoveIncompleteを期待: {other:?}"),
    }
    // 両方のオブジェクトが残る
    assert!(storage.object(BUCKET, "qa/a.png").is_some());
    assert!(storage.object(BUCKET, "qa/b.png").is_some());
}

#[tokio::test]
async fn test_move_copy_failure_is_provider_error() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/a.png", b"img".to_vec());
    storage.fail_on(StorageOp::Copy);

    let err = gateway.move_object("a.png", "b.png").await.unwrap_err();
    assert!(matches!(err, GatewayError::Provider(_)));
    assert!(storage.calls_of(StorageOp::Delete).is_empty());
    assert!(storage.object(BUCKET, "qa/a.png").is_some());
}

#[tokio::test]
async fn test_move_onto_itself_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/a.png", b"img".to_vec());

    let err = gateway.move_object("a.png", "a.png").await.unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
    assert!(!storage.has_mutations());
    assert!(storage.object(BUCKET, "qa/a.png").is_some());
}

#[tokio::test]
async fn test_delete_missing_skips_provider_delete() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());

    let outcome = gateway.delete("nothing.png").await.unwrap();
    assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
    assert!(storage.calls_of(StorageOp::Delete).is_empty());
}

#[tokio::test]
async fn test_delete_existing_object() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/a.png", b"img".to_vec());

    let outcome = gateway.delete("a.png").await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            delete_marker: false
        }
    );
    let deletes = storage.calls_of(StorageOp::Delete);
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].key, "qa/a.png");
    // 削除後の再確認は行わない
    assert_eq!(storage.calls_of(StorageOp::Exists).len(), 1);
}

#[tokio::test]
async fn test_delete_versioned_reports_marker() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.set_delete_marker(true);
    storage.insert(BUCKET, "qa/a.png", b"img".to_vec());

    let outcome = gateway.delete("a.png").await.unwrap();
    assert_eq!(
        outcome,
        DeleteOutcome::Deleted {
            delete_marker: true
        }
    );
}

#[tokio::test]
async fn test_download_absolute_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/doc.pdf", b"x".to_vec());

    let target = elsewhere.path().join("escaped.pdf");
    let err = gateway
        .download("doc.pdf", target.to_str().unwrap())
        .await
        .unwrap_err();
    match err {
        GatewayError::Io { source, .. } => {
            assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput)
        }
        other => panic!("Ioを期待: {other:?}"),
    }
    assert!(!target.exists());
    assert!(storage.calls().is_empty());
}

#[tokio::test]
async fn test_download_parent_dir_name_is_rejected() {
    let parent = tempfile::tempdir().unwrap();
    let temp_dir = parent.path().join("downloads");
    std::fs::create_dir(&temp_dir).unwrap();
    let (gateway, storage) = test_gateway("qa", &temp_dir);
    storage.insert(BUCKET, "qa/doc.pdf", b"x".to_vec());

    for name in ["../escaped.pdf", "sub/../../escaped.pdf", ""] {
        let err = gateway.download("doc.pdf", name).await.unwrap_err();
        assert!(matches!(err, GatewayError::Io { .. }), "{name}");
    }
    assert!(!parent.path().join("escaped.pdf").exists());
    assert!(storage.calls().is_empty());
}

#[tokio::test]
async fn test_download_nested_relative_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("reports")).unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.insert(BUCKET, "qa/doc.pdf", b"x".to_vec());

    let path = gateway.download("doc.pdf", "reports/out.pdf").await.unwrap();
    assert_eq!(path, dir.path().join("reports/out.pdf"));
    assert!(path.starts_with(dir.path()));
}

#[tokio::test]
async fn test_download_writes_into_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    let temp_dir = format!("{}/", dir.path().display());
    let (gateway, storage) = test_gateway("production", Path::new(&temp_dir));
    storage.insert(BUCKET, "production/doc.pdf", b"%PDF-1.7".to_vec());

    let path = gateway.download("doc.pdf", "report.pdf").await.unwrap();
    assert_eq!(path, dir.path().join("report.pdf"));
    assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
}

#[tokio::test]
async fn test_download_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    write_source(dir.path(), "report.pdf", b"stale contents");
    storage.insert(BUCKET, "qa/doc.pdf", b"fresh".to_vec());

    let path = gateway.download("doc.pdf", "report.pdf").await.unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"fresh");
}

#[tokio::test]
async fn test_download_missing_object_is_provider_error() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());

    let err = gateway.download("missing.pdf", "out.pdf").await.unwrap_err();
    assert!(matches!(err, GatewayError::Provider(_)));
    // 存在確認は行わない
    assert!(storage.calls_of(StorageOp::Exists).is_empty());
    assert!(!dir.path().join("out.pdf").exists());
}

#[tokio::test]
async fn test_download_into_missing_dir_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", &dir.path().join("does-not-exist"));
    storage.insert(BUCKET, "qa/doc.pdf", b"x".to_vec());

    let err = gateway.download("doc.pdf", "out.pdf").await.unwrap_err();
    assert!(matches!(err, GatewayError::Io { .. }));
}

#[tokio::test]
async fn test_signed_url_uses_ten_minute_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());

    let url = gateway.signed_url("doc.pdf").await.unwrap();
    assert_eq!(url, "memory://b/qa/doc.pdf?expires=600");
    assert_eq!(storage.calls_of(StorageOp::Presign)[0].key, "qa/doc.pdf");
}

#[tokio::test]
async fn test_signed_url_failure_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.fail_on(StorageOp::Presign);

    assert_eq!(gateway.signed_url("doc.pdf").await, None);
}

#[tokio::test]
async fn test_exists_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), "a.png", b"data");
    let (gateway, storage) = test_gateway("qa", dir.path());
    storage.fail_on(StorageOp::Exists);

    assert!(matches!(
        gateway.upload("a.png", &source).await,
        Err(GatewayError::Provider(_))
    ));
    assert!(matches!(
        gateway.delete("a.png").await,
        Err(GatewayError::Provider(_))
    ));
    assert!(!storage.has_mutations());
}
