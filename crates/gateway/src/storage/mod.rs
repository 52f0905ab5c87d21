//! # オブジェクトストレージ
//!
//! 外部オブジェクトストレージの抽象インターフェース。
//! Gatewayはこのトレイト経由でのみプロバイダを呼び出す。
//!
//! ## 実装
//! - `S3ObjectStorage`: AWS S3 および S3互換API（`vendor-aws`）
//! - `MemoryObjectStorage`: プロセス内実装（ローカル開発・テスト用）

pub mod memory;
#[cfg(feature = "vendor-aws")]
pub mod s3;

pub use memory::{MemoryObjectStorage, StorageCall, StorageOp};
#[cfg(feature = "vendor-aws")]
pub use s3::S3ObjectStorage;

use std::time::Duration;

use crate::error::GatewayError;

/// オブジェクトに付与する既定ACL。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAcl {
    Private,
    PublicRead,
}

impl ObjectAcl {
    /// `x-amz-acl`ヘッダーの値
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
        }
    }
}

/// バケットとキーの組。コピー元の指定に使う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// アップロード結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutput {
    /// オブジェクトのURL（ACLによっては公開取得できない）
    pub url: String,
}

/// コピー結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutput {
    /// コピー先オブジェクトのURL
    pub url: String,
}

/// 削除結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutput {
    /// プロバイダが削除マーカーを報告したか（バージョニング有効バケット）
    pub delete_marker: bool,
}

/// 取得結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOutput {
    pub body: Vec<u8>,
}

/// オブジェクトストレージの抽象インターフェース。
///
/// キーは全てフルキー（環境接頭辞付き）で渡される。
/// 認証情報の解決、HTTP通信、リトライ、署名計算は実装側の責務。
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// オブジェクトを書き込む。`acl`がNoneの場合はACLヘッダーを送らない。
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        acl: Option<ObjectAcl>,
    ) -> Result<PutOutput, GatewayError>;

    /// プロバイダ側で`source`を`dest_key`にコピーする。
    async fn copy(
        &self,
        bucket: &str,
        dest_key: &str,
        source: &ObjectLocation,
    ) -> Result<CopyOutput, GatewayError>;

    /// オブジェクトを削除する。
    async fn delete(&self, bucket: &str, key: &str) -> Result<DeleteOutput, GatewayError>;

    /// オブジェクトを取得する。存在しない場合はエラー。
    async fn get(&self, bucket: &str, key: &str) -> Result<GetOutput, GatewayError>;

    /// オブジェクトの存在を確認する。
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, GatewayError>;

    /// 読み取り用の署名付きURLを生成する。
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, GatewayError>;
}
