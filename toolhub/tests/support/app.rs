use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use toolhub::cache::{MemoryCache, SharedCache};
use toolhub::common::error::HubError;
use toolhub::notify::TwoFactorNotifier;
use toolhub::{api, ApiConfig, AppState};

/// テスト用JWT秘密鍵
pub const TEST_JWT_SECRET: &str = "contract-test-secret";

/// 送信したコードを記録する通知先
///
/// `fail_sends`がtrueなら送信を失敗させる。chat IDは`invalid`以外を有効とみなす。
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail_sends: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    /// 最後に送ったコード
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }

    /// 送信回数
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// 送信失敗を切り替える
    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap() = fail;
    }
}

#[async_trait]
impl TwoFactorNotifier for RecordingNotifier {
    async fn send_code(&self, chat_id: &str, code: &str, _ttl: Duration) -> Result<(), HubError> {
        if *self.fail_sends.lock().unwrap() {
            return Err(HubError::Notifier("telegram unreachable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), code.to_string()));
        Ok(())
    }

    async fn verify_chat_id(&self, chat_id: &str) -> Result<bool, HubError> {
        Ok(chat_id != "invalid")
    }
}

/// テスト用アプリケーション一式
#[allow(dead_code)]
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub notifier: Arc<RecordingNotifier>,
    pub cache: SharedCache,
}

/// テスト用のインメモリSQLiteプールを作成する
pub async fn create_test_db_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    toolhub::db::migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// テスト用のアプリケーションを作成する（.oneshot()スタイルのテスト用）
pub async fn create_test_app() -> TestApp {
    let pool = create_test_db_pool().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let cache: SharedCache = Arc::new(MemoryCache::new());

    let state = AppState::new(
        pool.clone(),
        TEST_JWT_SECRET.to_string(),
        ApiConfig::default(),
        cache.clone(),
        notifier.clone(),
    );

    TestApp {
        app: api::create_app(state),
        pool,
        notifier,
        cache,
    }
}
