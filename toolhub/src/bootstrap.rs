//! サーバー初期化ロジック
//!
//! データベース接続、管理者作成、JWT秘密鍵、キャッシュ、通知先など
//! サーバー起動に必要なコンポーネントを初期化する。

use crate::cache::MemoryCache;
use crate::config::Settings;
use crate::{auth, db, notify, ApiConfig, AppState};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

/// サーバー初期化を実行し、`AppState`を返す
pub async fn initialize(settings: &Settings) -> anyhow::Result<AppState> {
    info!("toolhub v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = crate::config::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let db_pool = db::migrations::initialize_database(&settings.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database_url))?;
    info!("Database ready: {}", settings.database_url);

    auth::bootstrap::ensure_admin_exists(&db_pool)
        .await
        .context("Failed to ensure admin exists")?;

    let jwt_secret =
        crate::jwt_secret::get_or_create_jwt_secret().context("Failed to get or create JWT secret")?;
    info!("Authentication system initialized");

    let cache = Arc::new(MemoryCache::new());
    let notifier = notify::from_settings(settings);

    info!(
        cache_ttl_secs = settings.cache_ttl.as_secs(),
        two_factor_ttl_secs = settings.two_factor_ttl.as_secs(),
        "Cache initialized"
    );

    Ok(AppState::new(
        db_pool,
        jwt_secret,
        ApiConfig::from(settings),
        cache,
        notifier,
    ))
}
