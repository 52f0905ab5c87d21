//! # 環境別キー名前空間
//!
//! 呼び出し側が渡す論理キーに`<environment>/`を付与し、
//! ストレージに送るフルキーを作る。接頭辞は呼び出し側に露出しない。

/// 環境名から作られるキー接頭辞。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// 小文字化済みの環境名から名前空間を作る。
    pub fn new(environment: &str) -> Self {
        Self {
            prefix: format!("{environment}/"),
        }
    }

    /// 接頭辞（末尾の`/`を含む）
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 論理キーをフルキーに変換する。
    ///
    /// 論理キーはそのまま連結する（先頭の`/`も削らない）。
    pub fn full_key(&self, logical_key: &str) -> String {
        format!("{}{logical_key}", self.prefix)
    }
}
