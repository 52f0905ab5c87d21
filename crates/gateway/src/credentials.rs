//! # 認証情報プロバイダ
//!
//! S3クライアントに渡す認証情報の取得方法を抽象化する。
//! どの実装を使うかは`GatewayConfig::credential_source()`で決まる。
//!
//! - `ProfileFileCredentials`: `~/.aws/credentials` の名前付きプロファイル（ローカル開発用）
//! - `DefaultChainCredentials`: 環境変数・プロファイル・インスタンスメタデータの標準チェーン

use s3::creds::Credentials;

use crate::config::CredentialSource;
use crate::error::GatewayError;

/// 認証情報プロバイダのトレイト。
pub trait CredentialProvider: Send + Sync {
    /// ログ出力用の名前
    fn name(&self) -> &str;

    /// 認証情報を解決する。
    fn credentials(&self) -> Result<Credentials, GatewayError>;
}

/// ユーザーごとの認証ファイルから名前付きプロファイルを読むプロバイダ。
/// ローカル開発以外では使用しない。
pub struct ProfileFileCredentials {
    profile: String,
}

impl ProfileFileCredentials {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

impl CredentialProvider for ProfileFileCredentials {
    fn name(&self) -> &str {
        "profile-file"
    }

    fn credentials(&self) -> Result<Credentials, GatewayError> {
        Credentials::from_profile(Some(&self.profile)).map_err(|e| {
            GatewayError::Credentials(format!(
                "プロファイル {} の読み込みに失敗: {e}",
                self.profile
            ))
        })
    }
}

/// SDK標準の解決チェーンを使うプロバイダ。
pub struct DefaultChainCredentials;

impl CredentialProvider for DefaultChainCredentials {
    fn name(&self) -> &str {
        "default-chain"
    }

    fn credentials(&self) -> Result<Credentials, GatewayError> {
        // 全てNoneを渡すと標準チェーンで解決される
        Credentials::new(None, None, None, None, None)
            .map_err(|e| GatewayError::Credentials(format!("標準チェーンでの解決に失敗: {e}")))
    }
}

/// 設定された取得方法に対応するプロバイダを返す。
pub fn provider_for(source: &CredentialSource) -> Box<dyn CredentialProvider> {
    match source {
        CredentialSource::ProfileFile { profile } => {
            Box::new(ProfileFileCredentials::new(profile.clone()))
        }
        CredentialSource::DefaultChain => Box::new(DefaultChainCredentials),
    }
}
