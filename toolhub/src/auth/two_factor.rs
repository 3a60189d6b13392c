//! 二段階認証コードの発行と検証
//!
//! コードはキャッシュの`2fa:{user_id}`に有効期限付きで保存し、
//! 一致した時点で削除する（再利用不可）。

use crate::cache::{keys, CacheStore};
use crate::common::auth::User;
use crate::common::error::HubError;
use crate::notify::TwoFactorNotifier;
use std::time::Duration;

/// コードの桁数
pub const CODE_LENGTH: usize = 6;

/// コードを保存するキャッシュキー
pub fn cache_key(user_id: i64) -> String {
    keys::two_factor(user_id)
}

/// 数字のみのワンタイムコードを生成
pub fn generate_code() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// コードを発行してユーザーのTelegramへ送る
///
/// 送信に失敗した場合は保存したコードも消す。
///
/// # Returns
/// * `Ok(())` - 送信成功
/// * `Err(HubError::Validation)` - 送信先chat IDが未登録
/// * `Err(HubError::Cache)` - コードを保存できない
/// * `Err(HubError::Notifier)` - 送信失敗
pub async fn issue_code(
    cache: &dyn CacheStore,
    notifier: &dyn TwoFactorNotifier,
    user: &User,
    ttl: Duration,
) -> Result<(), HubError> {
    let chat_id = user
        .telegram_id
        .as_deref()
        .ok_or_else(|| HubError::validation("Telegram chat ID is not configured"))?;

    let key = cache_key(user.id);
    let code = generate_code();
    cache.set(&key, code.clone(), ttl).await?;

    if let Err(e) = notifier.send_code(chat_id, &code, ttl).await {
        tracing::error!(user_id = user.id, "Failed to deliver 2FA code: {}", e);
        if let Err(cleanup) = cache.delete(&key).await {
            tracing::warn!(user_id = user.id, "Failed to discard undelivered 2FA code: {}", cleanup);
        }
        return Err(e);
    }

    tracing::info!(user_id = user.id, "2FA code issued");
    Ok(())
}

/// 提出されたコードを検証する
///
/// # Returns
/// * `Ok(())` - 一致（保存済みコードは削除される）
/// * `Err(HubError::Validation)` - コードが無い・期限切れ
/// * `Err(HubError::Authentication)` - 不一致（コードは残る）
pub async fn verify_code(
    cache: &dyn CacheStore,
    user_id: i64,
    submitted: &str,
) -> Result<(), HubError> {
    let key = cache_key(user_id);
    let stored = cache
        .get(&key)
        .await?
        .ok_or_else(|| HubError::validation("2FA code expired or not found"))?;

    if !constant_time_eq(stored.as_bytes(), submitted.trim().as_bytes()) {
        tracing::warn!(user_id, "Invalid 2FA code submitted");
        return Err(HubError::Authentication("Invalid 2FA code".to_string()));
    }

    cache.delete(&key).await?;
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
