//! # Objstore Gateway
//!
//! 環境別に名前空間化されたオブジェクトストレージのGateway。
//!
//! ## 役割
//! - 論理キーへの環境接頭辞（`<environment>/`）の付与
//! - 既存キーへのアップロード拒否、存在しないキーの移動拒否
//! - 冪等な削除
//! - 一時ディレクトリへのダウンロード
//! - 10分間有効な署名付きURLの発行
//!
//! 認証情報の解決、HTTP通信、リトライ、署名計算はストレージ実装
//! （`storage::ObjectStorage`）に委ねる。
//!
//! ```no_run
//! # async fn run() -> Result<(), objstore_gateway::GatewayError> {
//! use objstore_gateway::{GatewayConfig, ObjectStoreGateway};
//!
//! let config = GatewayConfig::new("media-bucket", "Production", "/tmp/");
//! let gateway = ObjectStoreGateway::connect(config)?;
//! let url = gateway.upload("images/a.png", "/local/a.png").await?;
//! # let _ = url;
//! # Ok(())
//! # }
//! ```

pub mod config;
#[cfg(feature = "vendor-aws")]
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod namespace;
pub mod storage;

pub use config::{CredentialSource, GatewayConfig};
pub use error::GatewayError;
pub use gateway::{DeleteOutcome, ObjectStoreGateway, SIGNED_URL_TTL};
pub use namespace::KeyNamespace;
pub use storage::{MemoryObjectStorage, ObjectAcl, ObjectStorage};
