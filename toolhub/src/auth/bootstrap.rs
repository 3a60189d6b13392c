//! 初回起動時の管理者アカウント作成
//!
//! 環境変数から管理者を作成する。

use crate::auth::password::{hash_password, validate_new_password};
use crate::common::auth::UserRole;
use crate::common::error::HubError;
use crate::config::{get_env_with_fallback, get_env_with_fallback_or};
use crate::db;

/// 環境変数から管理者を作成
///
/// # Environment Variables
/// * `TOOLHUB_ADMIN_USERNAME` - 管理者ユーザー名（省略時: "admin"）
/// * `TOOLHUB_ADMIN_EMAIL` - 管理者メールアドレス（省略時: "admin@localhost"）
/// * `TOOLHUB_ADMIN_PASSWORD` - 管理者パスワード（必須）
///
/// # Returns
/// * `Ok(Some(username))` - 管理者作成成功、または同名ユーザーが既に存在
/// * `Ok(None)` - パスワードが未設定（作成しない）
/// * `Err(HubError)` - 作成失敗
pub async fn create_admin_from_env(pool: &sqlx::SqlitePool) -> Result<Option<String>, HubError> {
    let password = match get_env_with_fallback("TOOLHUB_ADMIN_PASSWORD", "ADMIN_PASSWORD") {
        Some(p) if !p.is_empty() => p,
        _ => {
            tracing::debug!("TOOLHUB_ADMIN_PASSWORD not set, skipping admin creation from env");
            return Ok(None);
        }
    };
    validate_new_password(&password)?;

    let username = get_env_with_fallback_or("TOOLHUB_ADMIN_USERNAME", "ADMIN_USERNAME", "admin");
    let email = get_env_with_fallback_or("TOOLHUB_ADMIN_EMAIL", "ADMIN_EMAIL", "admin@localhost");

    let password_hash = hash_password(&password)?;

    match db::users::create(pool, &username, &email, &password_hash, UserRole::Admin).await {
        Ok(user) => {
            tracing::info!("Created admin user from env: username={}", user.username);
            Ok(Some(user.username))
        }
        Err(HubError::Conflict(_)) => {
            tracing::warn!("User {} already exists, skipping admin creation", username);
            Ok(Some(username))
        }
        Err(e) => {
            tracing::error!("Failed to create admin user from env: {}", e);
            Err(e)
        }
    }
}

/// 初回起動時の管理者作成処理
///
/// 管理者が1人も居ない場合に限り、環境変数から作成を試みる。
pub async fn ensure_admin_exists(pool: &sqlx::SqlitePool) -> Result<(), HubError> {
    if db::users::exists_with_role(pool, UserRole::Admin).await? {
        tracing::debug!("Admin user already exists, skipping admin creation");
        return Ok(());
    }

    match create_admin_from_env(pool).await? {
        Some(username) => tracing::info!("Admin user ready: {}", username),
        None => tracing::warn!(
            "No admin user exists. Set TOOLHUB_ADMIN_PASSWORD to create one on startup"
        ),
    }
    Ok(())
}
