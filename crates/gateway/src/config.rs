//! # Gateway設定
//!
//! バケット名・リージョン・環境名などの設定値と、その検証。
//! 埋め込み先アプリケーションの設定ファイルから`serde`で読み込むか、
//! `GatewayConfig::from_env()`で環境変数から構築する。

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::GatewayError;

/// リージョン未指定時のデフォルト値
pub const DEFAULT_REGION: &str = "eu-west-1";

/// ローカル開発環境を表す環境名（小文字化後）
pub const LOCAL_ENVIRONMENT: &str = "local";

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Gatewayの設定。
///
/// `environment`は大文字小文字を区別しない。`validated()`で一度だけ小文字化され、
/// 以降は変更されない。
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// アップロード先バケット名
    pub bucket_name: String,
    /// バケットのリージョン
    #[serde(default = "default_region")]
    pub region: String,
    /// 環境名（local, qa, staging, production 等）。オブジェクトキーの接頭辞になる。
    pub environment: String,
    /// ローカル開発用の認証プロファイル名（`~/.aws/credentials`のセクション名）。
    /// 環境が`local`の場合のみ必須。
    #[serde(default)]
    pub local_profile: Option<String>,
    /// ダウンロードしたファイルの書き込み先ディレクトリ
    pub temporary_file_location: PathBuf,
    /// trueの場合、アップロード時に`public-read` ACLを付与する
    #[serde(default)]
    pub public_access: bool,
    /// S3互換ストレージ（MinIO, Cloudflare R2等）のエンドポイント。
    /// Noneの場合はAWS S3のリージョンエンドポイントを使用する。
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// 認証情報の取得方法。環境名から`validated()`時に一度だけ決定される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// ユーザーごとの認証ファイルから名前付きプロファイルを読む（ローカル開発用）
    ProfileFile { profile: String },
    /// SDK標準の解決チェーン（環境変数、インスタンスメタデータ等）
    DefaultChain,
}

impl GatewayConfig {
    /// 必須項目を持つ設定を構築する。その他の項目はデフォルト値。
    pub fn new(
        bucket_name: impl Into<String>,
        environment: impl Into<String>,
        temporary_file_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: default_region(),
            environment: environment.into(),
            local_profile: None,
            temporary_file_location: temporary_file_location.into(),
            public_access: false,
            endpoint: None,
        }
    }

    /// 必須項目を検証し、環境名を小文字化した設定を返す。
    ///
    /// 空文字（空白のみを含む）は未設定として扱う。
    pub fn validated(mut self) -> Result<Self, GatewayError> {
        require("bucket_name", &self.bucket_name)?;
        require("region", &self.region)?;
        require("environment", &self.environment)?;
        if self.temporary_file_location.as_os_str().is_empty() {
            return Err(GatewayError::Config {
                field: "temporary_file_location",
            });
        }

        self.environment = self.environment.trim().to_lowercase();
        self.region = self.region.trim().to_string();

        if self.environment == LOCAL_ENVIRONMENT {
            match self.local_profile.as_deref() {
                Some(profile) if !profile.trim().is_empty() => {}
                _ => {
                    return Err(GatewayError::Config {
                        field: "local_profile",
                    })
                }
            }
        }

        Ok(self)
    }

    /// 設定に応じた認証情報の取得方法を返す。
    ///
    /// 環境が`local`の場合のみプロファイルファイルを使用する。
    /// それ以外の環境では`local_profile`が設定されていても無視される。
    pub fn credential_source(&self) -> CredentialSource {
        match (&self.local_profile, self.environment.eq_ignore_ascii_case(LOCAL_ENVIRONMENT)) {
            (Some(profile), true) => CredentialSource::ProfileFile {
                profile: profile.trim().to_string(),
            },
            _ => CredentialSource::DefaultChain,
        }
    }

    /// 環境変数から構築する。
    ///
    /// | 変数 | 項目 |
    /// |------|------|
    /// | `OBJSTORE_BUCKET` | bucket_name |
    /// | `OBJSTORE_REGION` | region（省略時 eu-west-1） |
    /// | `OBJSTORE_ENVIRONMENT` | environment |
    /// | `OBJSTORE_LOCAL_PROFILE` | local_profile |
    /// | `OBJSTORE_TEMP_DIR` | temporary_file_location |
    /// | `OBJSTORE_PUBLIC_ACCESS` | public_access（true/false/1/0） |
    /// | `OBJSTORE_ENDPOINT` | endpoint |
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let bucket_name = lookup("OBJSTORE_BUCKET").ok_or(GatewayError::Config {
            field: "bucket_name",
        })?;
        let environment = lookup("OBJSTORE_ENVIRONMENT").ok_or(GatewayError::Config {
            field: "environment",
        })?;
        let temporary_file_location = lookup("OBJSTORE_TEMP_DIR").ok_or(GatewayError::Config {
            field: "temporary_file_location",
        })?;

        let public_access = match lookup("OBJSTORE_PUBLIC_ACCESS") {
            None => false,
            Some(v) => parse_flag(&v).ok_or_else(|| {
                GatewayError::InvalidConfig(format!("OBJSTORE_PUBLIC_ACCESSの値を解釈できません: {v}"))
            })?,
        };

        Ok(Self {
            bucket_name,
            region: lookup("OBJSTORE_REGION").unwrap_or_else(default_region),
            environment,
            local_profile: lookup("OBJSTORE_LOCAL_PROFILE"),
            temporary_file_location: PathBuf::from(temporary_file_location),
            public_access,
            endpoint: lookup("OBJSTORE_ENDPOINT").filter(|e| !e.trim().is_empty()),
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::Config { field });
    }
    Ok(())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}
