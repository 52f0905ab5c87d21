//! # ObjectStoreGateway
//!
//! 論理キーを環境名前空間に変換し、存在確認を挟んで外部ストレージを呼び出す。
//!
//! ## 操作
//! - `upload` — ローカルファイルをアップロード（既存キーは拒否）
//! - `move_object` — コピー＋削除によるリネーム（非アトミック）
//! - `delete` — 削除（存在しなければ何もせず成功）
//! - `download` — 一時ディレクトリへダウンロード
//! - `signed_url` — 10分間有効な署名付きURL（失敗時はNone）
//!
//! 存在確認は助言的なもので、確認から操作までの間に他の書き込みが割り込む可能性がある。
//! プロバイダにcompare-and-swapが無いため、この競合は解消しない。

#[cfg(test)]
mod tests;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::namespace::KeyNamespace;
use crate::storage::{ObjectAcl, ObjectLocation, ObjectStorage};

/// 署名付きURLの有効期間（10分）
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(10 * 60);

/// 削除操作の結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// オブジェクトが存在しなかったため、削除を呼ばずに成功とした
    AlreadyAbsent,
    /// 削除した
    Deleted {
        /// プロバイダが削除マーカーを報告したか
        delete_marker: bool,
    },
}

/// 環境別に名前空間化されたオブジェクトストレージのGateway。
pub struct ObjectStoreGateway {
    config: GatewayConfig,
    namespace: KeyNamespace,
    storage: Arc<dyn ObjectStorage>,
}

impl ObjectStoreGateway {
    /// 設定を検証し、注入されたストレージでGatewayを構築する。
    pub fn new(config: GatewayConfig, storage: Arc<dyn ObjectStorage>) -> Result<Self, GatewayError> {
        let config = config.validated()?;
        let namespace = KeyNamespace::new(&config.environment);

        tracing::info!(
            bucket = %config.bucket_name,
            region = %config.region,
            environment = %config.environment,
            public_access = config.public_access,
            "ObjectStoreGatewayを初期化"
        );

        Ok(Self {
            config,
            namespace,
            storage,
        })
    }

    /// 設定を検証し、S3互換ストレージに接続するGatewayを構築する。
    ///
    /// 環境が`local`の場合は`local_profile`の認証プロファイルを、
    /// それ以外は標準の認証チェーンを使う。
    #[cfg(feature = "vendor-aws")]
    pub fn connect(config: GatewayConfig) -> Result<Self, GatewayError> {
        let config = config.validated()?;
        let storage = crate::storage::S3ObjectStorage::from_config(&config)?;
        Self::new(config, Arc::new(storage))
    }

    /// 検証済みの設定
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// 小文字化された環境名
    pub fn environment(&self) -> &str {
        &self.config.environment
    }

    /// 論理キーに対応するフルキー（ログ・診断用）
    pub fn full_key(&self, logical_key: &str) -> String {
        self.namespace.full_key(logical_key)
    }

    fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    /// 論理キーのオブジェクトが存在するか
    pub async fn exists(&self, logical_key: &str) -> Result<bool, GatewayError> {
        let full_key = self.full_key(logical_key);
        self.storage.exists(self.bucket(), &full_key).await
    }

    /// ローカルファイルを論理キーにアップロードし、オブジェクトのURLを返す。
    ///
    /// - ファイルが読めない場合は`Io`
    /// - キーが既に存在する場合は`Conflict`（プロバイダへの書き込みは行わない）
    ///
    /// `public_access`が無効の場合はACLを送らないため、返るURLは公開取得できないことがある。
    pub async fn upload(
        &self,
        logical_key: &str,
        source: impl AsRef<Path>,
    ) -> Result<String, GatewayError> {
        let source = source.as_ref();
        let body = tokio::fs::read(source)
            .await
            .map_err(|e| GatewayError::io(source, e))?;

        let full_key = self.full_key(logical_key);
        if self.storage.exists(self.bucket(), &full_key).await? {
            return Err(GatewayError::Conflict(full_key));
        }

        let content_type = mime_guess::from_path(source).first_or_octet_stream();
        let acl = self.config.public_access.then_some(ObjectAcl::PublicRead);

        let output = self
            .storage
            .put(self.bucket(), &full_key, body, content_type.essence_str(), acl)
            .await?;

        tracing::info!(key = %full_key, url = %output.url, "アップロード完了");
        Ok(output.url)
    }

    /// オブジェクトを`from`から`to`へ移動し、コピー先のURLを返す。
    ///
    /// コピー後に元オブジェクトを削除する2段階の操作で、アトミックではない。
    /// 削除に失敗した場合は`MoveIncomplete`を返し、両方のオブジェクトが残る。
    pub async fn move_object(&self, from: &str, to: &str) -> Result<String, GatewayError> {
        let source_key = self.full_key(from);
        let destination_key = self.full_key(to);

        if !self.storage.exists(self.bucket(), &source_key).await? {
            return Err(GatewayError::NotFound(source_key));
        }
        // 同一キーへのコピー＋削除はオブジェクトを失う
        if source_key == destination_key {
            return Err(GatewayError::Conflict(destination_key));
        }

        let copied = self
            .storage
            .copy(
                self.bucket(),
                &destination_key,
                &ObjectLocation::new(self.bucket(), source_key.as_str()),
            )
            .await?;

        if let Err(e) = self.storage.delete(self.bucket(), &source_key).await {
            tracing::warn!(
                source_key = %source_key,
                destination_key = %destination_key,
                error = %e,
                "コピー後の元オブジェクト削除に失敗"
            );
            return Err(GatewayError::MoveIncomplete {
                source_key,
                destination_key,
                copied_url: copied.url,
                reason: e.to_string(),
            });
        }

        tracing::info!(
            source_key = %source_key,
            destination_key = %destination_key,
            "移動完了"
        );
        Ok(copied.url)
    }

    /// オブジェクトを削除する。
    ///
    /// 存在しない場合はプロバイダの削除を呼ばずに`AlreadyAbsent`を返す。
    pub async fn delete(&self, logical_key: &str) -> Result<DeleteOutcome, GatewayError> {
        let full_key = self.full_key(logical_key);

        if !self.storage.exists(self.bucket(), &full_key).await? {
            tracing::debug!(key = %full_key, "削除対象が存在しません");
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        let output = self.storage.delete(self.bucket(), &full_key).await?;
        tracing::info!(
            key = %full_key,
            delete_marker = output.delete_marker,
            "削除完了"
        );
        Ok(DeleteOutcome::Deleted {
            delete_marker: output.delete_marker,
        })
    }

    /// オブジェクトを`temporary_file_location`配下の`name`へ書き出し、そのパスを返す。
    ///
    /// 既存ファイルは警告なく上書きする。存在確認は行わず、
    /// キーが無い場合はプロバイダのエラーがそのまま返る。
    ///
    /// `name`は一時ディレクトリ内の相対パスに限る。絶対パスや`..`を含む場合は
    /// プロバイダを呼ばずに`Io`（`InvalidInput`）を返す。
    pub async fn download(&self, logical_key: &str, name: &str) -> Result<PathBuf, GatewayError> {
        let relative = Path::new(name);
        let confined = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !confined {
            return Err(GatewayError::io(
                relative,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "ファイル名は一時ディレクトリ内の相対パスである必要があります",
                ),
            ));
        }

        let full_key = self.full_key(logical_key);
        let output = self.storage.get(self.bucket(), &full_key).await?;

        let path = self.config.temporary_file_location.join(relative);
        tokio::fs::write(&path, &output.body)
            .await
            .map_err(|e| GatewayError::io(&path, e))?;

        tracing::info!(
            key = %full_key,
            path = %path.display(),
            size = output.body.len(),
            "ダウンロード完了"
        );
        Ok(path)
    }

    /// 10分間有効な読み取り用署名付きURLを返す。
    ///
    /// 失敗した場合はエラーを返さず`None`になる。
    pub async fn signed_url(&self, logical_key: &str) -> Option<String> {
        let full_key = self.full_key(logical_key);
        match self
            .storage
            .presign_get(self.bucket(), &full_key, SIGNED_URL_TTL)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "署名付きURLの生成に失敗");
                None
            }
        }
    }
}
