//! # Gateway エラー型
//!
//! 全操作で共通のエラー型。失敗の種類ごとに1つのバリアントを持つ。
//! 署名付きURL発行（`signed_url`）のみエラーを`None`に畳み込み、
//! それ以外の操作は全てこの型で失敗を返す。

use std::path::PathBuf;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 必須設定項目が未設定（初期化時のみ発生し、Gatewayは構築されない）
    #[error("設定エラー: {field} が未設定です")]
    Config {
        /// 未設定の項目名
        field: &'static str,
    },
    /// 設定値は存在するが利用できない（リージョン名の解釈失敗等）
    #[error("設定値が不正です: {0}")]
    InvalidConfig(String),
    /// 認証情報の解決に失敗
    #[error("認証情報の取得に失敗: {0}")]
    Credentials(String),
    /// ローカルファイルの読み書きに失敗
    #[error("ローカルファイルの入出力に失敗 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// アップロード先のオブジェクトが既に存在する
    #[error("オブジェクトが既に存在します: {0}")]
    Conflict(String),
    /// 移動元のオブジェクトが存在しない
    #[error("オブジェクトが見つかりません: {0}")]
    NotFound(String),
    /// 移動のコピーは成功したが、元オブジェクトの削除に失敗した。
    ///
    /// この時点で移動元・移動先の両方にオブジェクトが存在する。
    /// 呼び出し側で`source_key`の削除をやり直すか、`destination_key`を破棄すること。
    #[error(
        "コピー後の元オブジェクト削除に失敗 ({source_key} -> {destination_key}): {reason}"
    )]
    MoveIncomplete {
        /// 残ってしまった移動元のフルキー
        source_key: String,
        /// コピー済みの移動先のフルキー
        destination_key: String,
        /// コピー結果のURL
        copied_url: String,
        /// 削除失敗の理由
        reason: String,
    },
    /// ストレージプロバイダの操作に失敗
    #[error("ストレージ操作に失敗: {0}")]
    Provider(String),
}

impl GatewayError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GatewayError::Io {
            path: path.into(),
            source,
        }
    }
}
