// ユーザーCRUD操作

use super::{is_unique_violation, parse_optional_timestamp, parse_timestamp, to_db_timestamp};
use crate::common::auth::{User, UserRole};
use crate::common::error::HubError;
use crate::common::pagination::Page;
use chrono::Utc;
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_2fa_enabled, \
     telegram_id, created_at, updated_at, last_login";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    is_2fa_enabled: bool,
    telegram_id: Option<String>,
    created_at: String,
    updated_at: String,
    last_login: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = HubError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = UserRole::parse(&row.role)
            .ok_or_else(|| HubError::Database(format!("Unknown role '{}'", row.role)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            is_2fa_enabled: row.is_2fa_enabled,
            telegram_id: row.telegram_id,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            last_login: parse_optional_timestamp(row.last_login.as_deref())?,
        })
    }
}

/// ユーザーを作成
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `username` - ユーザー名
/// * `email` - メールアドレス
/// * `password_hash` - bcryptハッシュ化されたパスワード
/// * `role` - ユーザーロール
///
/// # Returns
/// * `Ok(User)` - 作成されたユーザー
/// * `Err(HubError::Conflict)` - ユーザー名またはメールアドレスが重複
pub async fn create(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
    role: UserRole,
) -> Result<User, HubError> {
    let now = to_db_timestamp(Utc::now());

    let id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, role, is_2fa_enabled, telegram_id, created_at, updated_at, last_login)
         VALUES (?, ?, ?, ?, 0, NULL, ?, ?, NULL)",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            HubError::Conflict("Username or email already registered".to_string())
        } else {
            HubError::Database(format!("Failed to create user: {}", e))
        }
    })?
    .last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::Database(format!("User {} vanished after insert", id)))
}

/// IDでユーザーを検索
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, HubError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find user: {}", e)))?;

    row.map(User::try_from).transpose()
}

/// ユーザー名でユーザーを検索
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, HubError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find user: {}", e)))?;

    row.map(User::try_from).transpose()
}

/// メールアドレスでユーザーを検索
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, HubError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find user: {}", e)))?;

    row.map(User::try_from).transpose()
}

/// ユーザー一覧を取得（作成日時の新しい順）
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `role` - ロールで絞り込む場合に指定
/// * `page` - ページ指定
pub async fn list(
    pool: &SqlitePool,
    role: Option<UserRole>,
    page: Page,
) -> Result<Vec<User>, HubError> {
    let rows = match role {
        Some(role) => {
            sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {} FROM users WHERE role = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                USER_COLUMNS
            ))
            .bind(role.as_str())
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, UserRow>(&format!(
                "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                USER_COLUMNS
            ))
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(pool)
            .await
        }
    }
    .map_err(|e| HubError::Database(format!("Failed to list users: {}", e)))?;

    rows.into_iter().map(User::try_from).collect()
}

/// ロールを変更
pub async fn update_role(pool: &SqlitePool, id: i64, role: UserRole) -> Result<User, HubError> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(to_db_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to update role: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(HubError::NotFound("User not found".to_string()));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::NotFound("User not found".to_string()))
}

/// パスワードハッシュを更新
pub async fn update_password(
    pool: &SqlitePool,
    id: i64,
    password_hash: &str,
) -> Result<(), HubError> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(to_db_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to update password: {}", e)))?;
    Ok(())
}

/// 二段階認証の設定を更新
///
/// 無効化時もchat IDは残し、再有効化で上書きする。
pub async fn set_two_factor(
    pool: &SqlitePool,
    id: i64,
    enabled: bool,
    telegram_id: Option<&str>,
) -> Result<User, HubError> {
    let now = to_db_timestamp(Utc::now());
    match telegram_id {
        Some(chat_id) => {
            sqlx::query(
                "UPDATE users SET is_2fa_enabled = ?, telegram_id = ?, updated_at = ? WHERE id = ?",
            )
            .bind(enabled)
            .bind(chat_id)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await
        }
        None => {
            sqlx::query("UPDATE users SET is_2fa_enabled = ?, updated_at = ? WHERE id = ?")
                .bind(enabled)
                .bind(&now)
                .bind(id)
                .execute(pool)
                .await
        }
    }
    .map_err(|e| HubError::Database(format!("Failed to update 2FA settings: {}", e)))?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::NotFound("User not found".to_string()))
}

/// 最終ログイン日時を更新
pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> Result<(), HubError> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(to_db_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to update last login: {}", e)))?;
    Ok(())
}

/// 指定ロールのユーザーが存在するか
pub async fn exists_with_role(pool: &SqlitePool, role: UserRole) -> Result<bool, HubError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to count users: {}", e)))?;
    Ok(count > 0)
}
