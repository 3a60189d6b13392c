//! toolhub Server
//!
//! ツールカタログ（投稿・モデレーション・評価・コメント）のバックエンド

#![warn(missing_docs)]

/// 共通型定義
pub mod common;

/// REST APIハンドラー
pub mod api;

/// 認証・認可機能
pub mod auth;

/// 監査ログシステム
pub mod audit;

/// 読み取りキャッシュ
pub mod cache;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// データベースアクセス
pub mod db;

/// JWT秘密鍵管理
pub mod jwt_secret;

/// ロギング初期化ユーティリティ
pub mod logging;

/// 2FAコード通知
pub mod notify;

/// サーバー起動
pub mod server;

/// サーバー初期化
pub mod bootstrap;

/// 協調的シャットダウン
pub mod shutdown;

use std::time::Duration;

/// APIハンドラーが参照する設定値
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// アクセストークンの有効期間（分）
    pub token_expire_minutes: i64,
    /// 読み取りキャッシュの有効期間
    pub cache_ttl: Duration,
    /// 2FAコードの有効期間
    pub two_factor_ttl: Duration,
}

impl From<&config::Settings> for ApiConfig {
    fn from(settings: &config::Settings) -> Self {
        Self {
            token_expire_minutes: settings.token_expire_minutes,
            cache_ttl: settings.cache_ttl,
            two_factor_ttl: settings.two_factor_ttl,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token_expire_minutes: config::DEFAULT_TOKEN_EXPIRE_MINUTES,
            cache_ttl: Duration::from_secs(config::DEFAULT_CACHE_TTL_SECS),
            two_factor_ttl: Duration::from_secs(config::DEFAULT_TWO_FACTOR_TTL_SECS),
        }
    }
}

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// データベース接続プール
    pub db_pool: sqlx::SqlitePool,
    /// JWT秘密鍵
    pub jwt_secret: String,
    /// API設定
    pub config: ApiConfig,
    /// 読み取りキャッシュ
    pub cache: cache::SharedCache,
    /// 2FAコード通知先
    pub notifier: notify::SharedNotifier,
    /// 監査ログライター
    pub audit_log: audit::AuditLogWriter,
    /// 協調的シャットダウン
    pub shutdown: shutdown::ShutdownController,
}

impl AppState {
    /// 主要コンポーネントから状態を組み立てる
    ///
    /// 監査ログは同じDBプールに書き込む。
    pub fn new(
        db_pool: sqlx::SqlitePool,
        jwt_secret: String,
        config: ApiConfig,
        cache: cache::SharedCache,
        notifier: notify::SharedNotifier,
    ) -> Self {
        let storage = std::sync::Arc::new(db::audit_log::AuditLogStorage::new(db_pool.clone()));
        Self {
            db_pool,
            jwt_secret,
            config,
            cache,
            notifier,
            audit_log: audit::AuditLogWriter::new(storage),
            shutdown: shutdown::ShutdownController::default(),
        }
    }
}
