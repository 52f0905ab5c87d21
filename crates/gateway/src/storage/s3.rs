//! # S3互換オブジェクトストレージ実装
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIを`rust-s3`経由で呼び出す。
//! `rust-s3`は`fail-on-err`無効で使うため、HTTPステータスはここで判定する。

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use super::{
    CopyOutput, DeleteOutput, GetOutput, ObjectAcl, ObjectLocation, ObjectStorage, PutOutput,
};
use crate::config::GatewayConfig;
use crate::credentials;
use crate::error::GatewayError;

/// S3互換ストレージによるObjectStorage実装。
///
/// バケットハンドルはバケット名ごとに一度だけ構築して保持する。
/// 呼び出しごとの複製は認証情報を共有するため、期限切れ時の再取得結果も引き継がれる。
pub struct S3ObjectStorage {
    region: Region,
    credentials: Credentials,
    /// パス形式のアドレッシングを使うか（カスタムエンドポイント時）
    path_style: bool,
    buckets: RwLock<HashMap<String, Box<Bucket>>>,
}

impl S3ObjectStorage {
    pub fn new(region: Region, credentials: Credentials, path_style: bool) -> Self {
        Self {
            region,
            credentials,
            path_style,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// 検証済みの設定から構築する。
    ///
    /// 認証情報は`config.credential_source()`で選ばれたプロバイダから一度だけ解決する。
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let region = match &config.endpoint {
            Some(endpoint) => {
                tracing::info!(
                    s3_endpoint = %endpoint,
                    region = %config.region,
                    "カスタムS3エンドポイントを設定"
                );
                Region::Custom {
                    region: config.region.clone(),
                    endpoint: endpoint.clone(),
                }
            }
            None => config.region.parse::<Region>().map_err(|e| {
                GatewayError::InvalidConfig(format!("リージョン {} を解釈できません: {e}", config.region))
            })?,
        };

        let provider = credentials::provider_for(&config.credential_source());
        tracing::info!(credential_provider = provider.name(), "S3認証情報を解決します");
        let credentials = provider.credentials()?;

        let storage = Self::new(region, credentials, config.endpoint.is_some());
        storage.bucket(&config.bucket_name)?;
        Ok(storage)
    }

    /// バケットハンドルの複製を返す。初回のみ構築する（ネットワーク通信は発生しない）。
    fn bucket(&self, name: &str) -> Result<Box<Bucket>, GatewayError> {
        if let Some(bucket) = self.buckets.read().unwrap().get(name) {
            return Ok(bucket.clone());
        }

        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| GatewayError::Provider(format!("バケット {name} の初期化に失敗: {e}")))?;
        let bucket = if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        let mut buckets = self.buckets.write().unwrap();
        Ok(buckets.entry(name.to_string()).or_insert(bucket).clone())
    }

    fn object_url(bucket: &Bucket, key: &str) -> String {
        format!("{}/{}", bucket.url(), encode_key(key))
    }
}

/// キーをパスセグメントごとにURLエンコードする（`/`は残す）。
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn ensure_success(action: &str, key: &str, status: u16, body: &[u8]) -> Result<(), GatewayError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(GatewayError::Provider(format!(
        "{action}に失敗 ({key}): HTTP {status} {}",
        String::from_utf8_lossy(body)
    )))
}

/// `x-amz-delete-marker`ヘッダーが`true`か（大文字小文字は区別しない）
fn delete_marker(headers: &HashMap<String, String>) -> bool {
    headers
        .get("x-amz-delete-marker")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn provider_error(action: &str, key: &str, e: S3Error) -> GatewayError {
    GatewayError::Provider(format!("{action}に失敗 ({key}): {e}"))
}

#[async_trait::async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        acl: Option<ObjectAcl>,
    ) -> Result<PutOutput, GatewayError> {
        let mut handle = self.bucket(bucket)?;
        if let Some(acl) = acl {
            handle.add_header("x-amz-acl", acl.as_str());
        }

        tracing::debug!(bucket, key, content_type, size = body.len(), "PutObject");
        let response = handle
            .put_object_with_content_type(key, &body, content_type)
            .await
            .map_err(|e| provider_error("アップロード", key, e))?;
        ensure_success("アップロード", key, response.status_code(), response.bytes())?;

        Ok(PutOutput {
            url: Self::object_url(&handle, key),
        })
    }

    async fn copy(
        &self,
        bucket: &str,
        dest_key: &str,
        source: &ObjectLocation,
    ) -> Result<CopyOutput, GatewayError> {
        if source.bucket != bucket {
            return Err(GatewayError::Provider(format!(
                "バケット間のコピーには対応していません: {} -> {bucket}",
                source.bucket
            )));
        }
        let handle = self.bucket(bucket)?;

        // コピー元はURLエンコードが必要（非ASCII文字を含むキー）
        let encoded_source = encode_key(&source.key);
        tracing::debug!(bucket, source_key = %source.key, dest_key, "CopyObject");
        let status = handle
            .copy_object_internal(&encoded_source, dest_key)
            .await
            .map_err(|e| provider_error("コピー", dest_key, e))?;
        ensure_success("コピー", dest_key, status, &[])?;

        Ok(CopyOutput {
            url: Self::object_url(&handle, dest_key),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<DeleteOutput, GatewayError> {
        let handle = self.bucket(bucket)?;

        tracing::debug!(bucket, key, "DeleteObject");
        let response = handle
            .delete_object(key)
            .await
            .map_err(|e| provider_error("削除", key, e))?;
        ensure_success("削除", key, response.status_code(), response.bytes())?;

        Ok(DeleteOutput {
            delete_marker: delete_marker(&response.headers()),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<GetOutput, GatewayError> {
        let handle = self.bucket(bucket)?;

        tracing::debug!(bucket, key, "GetObject");
        let response = handle
            .get_object(key)
            .await
            .map_err(|e| provider_error("取得", key, e))?;
        ensure_success("取得", key, response.status_code(), response.bytes())?;

        Ok(GetOutput {
            body: response.bytes().to_vec(),
        })
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool, GatewayError> {
        let handle = self.bucket(bucket)?;

        match handle.head_object(key).await {
            Ok((_, 404)) => Ok(false),
            Ok((_, status)) => {
                ensure_success("存在確認", key, status, &[])?;
                Ok(true)
            }
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(provider_error("存在確認", key, e)),
        }
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, GatewayError> {
        let handle = self.bucket(bucket)?;
        let expiry_secs = u32::try_from(ttl.as_secs())
            .map_err(|_| GatewayError::Provider(format!("有効期限が大きすぎます: {ttl:?}")))?;

        handle
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| provider_error("署名付きURL生成", key, e))
    }
}
