//! # プロセス内オブジェクトストレージ
//!
//! 外部ストレージに接続できない開発環境・テストで使用する実装。
//! オブジェクトをメモリ内に保持し、全ての呼び出しを記録する。
//! 指定した操作を失敗させることもできる。

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use super::{
    CopyOutput, DeleteOutput, GetOutput, ObjectAcl, ObjectLocation, ObjectStorage, PutOutput,
};
use crate::error::GatewayError;

/// 操作の種類。失敗注入と呼び出し記録に使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Put,
    Copy,
    Delete,
    Get,
    Exists,
    Presign,
}

impl StorageOp {
    /// 書き込みを伴う操作か
    pub fn is_mutation(&self) -> bool {
        matches!(self, StorageOp::Put | StorageOp::Copy | StorageOp::Delete)
    }
}

/// 記録された呼び出し1件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCall {
    pub op: StorageOp,
    pub bucket: String,
    pub key: String,
}

/// 保存されたオブジェクト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub acl: Option<ObjectAcl>,
}

/// メモリ内オブジェクトストレージ。
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
    calls: RwLock<Vec<StorageCall>>,
    failing: RwLock<HashSet<StorageOp>>,
    /// バージョニング有効バケットとして振る舞い、削除時に削除マーカーを報告する
    versioned: RwLock<bool>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以降の`op`呼び出しを失敗させる。
    pub fn fail_on(&self, op: StorageOp) {
        self.failing.write().unwrap().insert(op);
    }

    /// 削除時に削除マーカーを報告するか（バージョニング有効バケットの模擬）。
    pub fn set_delete_marker(&self, enabled: bool) {
        *self.versioned.write().unwrap() = enabled;
    }

    /// 失敗注入を解除する。
    pub fn clear_failures(&self) {
        self.failing.write().unwrap().clear();
    }

    /// 保存されているオブジェクトを返す。
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .read()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// オブジェクトを直接配置する（呼び出し記録には残らない）。
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.write().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
                acl: None,
            },
        );
    }

    /// 記録された呼び出しの一覧
    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.read().unwrap().clone()
    }

    /// 記録された呼び出しのうち`op`に一致するもの
    pub fn calls_of(&self, op: StorageOp) -> Vec<StorageCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.op == op)
            .collect()
    }

    /// 書き込みを伴う呼び出しが一度でも行われたか
    pub fn has_mutations(&self) -> bool {
        self.calls.read().unwrap().iter().any(|c| c.op.is_mutation())
    }

    fn record(&self, op: StorageOp, bucket: &str, key: &str) -> Result<(), GatewayError> {
        self.calls.write().unwrap().push(StorageCall {
            op,
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if self.failing.read().unwrap().contains(&op) {
            return Err(GatewayError::Provider(format!(
                "{op:?} に失敗 (注入された障害): {bucket}/{key}"
            )));
        }
        Ok(())
    }

    fn url(bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        acl: Option<ObjectAcl>,
    ) -> Result<PutOutput, GatewayError> {
        self.record(StorageOp::Put, bucket, key)?;
        self.objects.write().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                acl,
            },
        );
        Ok(PutOutput {
            url: Self::url(bucket, key),
        })
    }

    async fn copy(
        &self,
        bucket: &str,
        dest_key: &str,
        source: &ObjectLocation,
    ) -> Result<CopyOutput, GatewayError> {
        self.record(StorageOp::Copy, bucket, dest_key)?;
        let mut objects = self.objects.write().unwrap();
        let object = objects
            .get(&(source.bucket.clone(), source.key.clone()))
            .cloned()
            .ok_or_else(|| {
                GatewayError::Provider(format!(
                    "NoSuchKey: {}/{}",
                    source.bucket, source.key
                ))
            })?;
        objects.insert((bucket.to_string(), dest_key.to_string()), object);
        Ok(CopyOutput {
            url: Self::url(bucket, dest_key),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<DeleteOutput, GatewayError> {
        self.record(StorageOp::Delete, bucket, key)?;
        // 旧バージョンは保持しない。マーカーの報告のみ模擬する
        self.objects
            .write()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(DeleteOutput {
            delete_marker: *self.versioned.read().unwrap(),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<GetOutput, GatewayError> {
        self.record(StorageOp::Get, bucket, key)?;
        self.object(bucket, key)
            .map(|o| GetOutput { body: o.body })
            .ok_or_else(|| GatewayError::Provider(format!("NoSuchKey: {bucket}/{key}")))
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, GatewayError> {
        self.record(StorageOp::Exists, bucket, key)?;
        Ok(self.object(bucket, key).is_some())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, GatewayError> {
        self.record(StorageOp::Presign, bucket, key)?;
        Ok(format!("{}?expires={}", Self::url(bucket, key), ttl.as_secs()))
    }
}
