//! 認証API
//!
//! ユーザー登録、ログイン（2FAコード検証を含む）、2FA設定、パスワード変更

use super::admin::invalidate_admin_stats;
use super::error::into_response;
use crate::audit::{actions, EntityType};
use crate::auth::{jwt, password, two_factor};
use crate::common::auth::{User, UserRole};
use crate::common::error::HubError;
use crate::db;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// ユーザー名の最小文字数
pub const USERNAME_MIN_LENGTH: usize = 3;
/// ユーザー名の最大文字数
pub const USERNAME_MAX_LENGTH: usize = 50;

/// 登録リクエスト
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// ユーザー名
    pub username: String,
    /// メールアドレス
    pub email: String,
    /// パスワード
    pub password: String,
}

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// ユーザー名
    pub username: String,
    /// パスワード
    pub password: String,
}

/// 2FAコード検証リクエスト
#[derive(Debug, Deserialize)]
pub struct VerifyTwoFactorRequest {
    /// Telegramで受け取ったコード
    pub code: String,
}

/// 2FA有効化リクエスト
#[derive(Debug, Deserialize)]
pub struct EnableTwoFactorRequest {
    /// コード送信先のTelegram chat ID
    pub telegram_chat_id: String,
}

/// パスワード変更リクエスト
#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    /// 現在のパスワード
    #[serde(default)]
    pub current_password: Option<String>,
    /// 新しいパスワード
    #[serde(default)]
    pub new_password: Option<String>,
}

/// トークンレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// JWTトークン
    pub access_token: String,
    /// 常に"bearer"
    pub token_type: String,
    /// 2FAコードの検証が必要か（trueなら仮トークン）
    pub requires_2fa: bool,
}

impl TokenResponse {
    fn bearer(access_token: String, requires_2fa: bool) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            requires_2fa,
        }
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), HubError> {
    let username_len = request.username.trim().chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&username_len) {
        return Err(HubError::validation(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH
        )));
    }
    if email_address::EmailAddress::parse_with_options(request.email.trim(), Default::default())
        .is_err()
    {
        return Err(HubError::validation("Invalid email address"));
    }
    password::validate_new_password(&request.password)
}

/// POST /api/auth/register - ユーザー登録
///
/// # Returns
/// * `201 Created` - 登録されたユーザー
/// * `400 Bad Request` - 入力不正、ユーザー名・メールアドレスの重複
pub async fn register(
    State(app_state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, Response> {
    validate_registration(&request).map_err(|e| into_response("Invalid registration", e))?;

    let username = request.username.trim();
    let email = request.email.trim();

    let username_taken = db::users::find_by_username(&app_state.db_pool, username)
        .await
        .map_err(|e| into_response("Failed to look up username", e))?
        .is_some();
    if username_taken {
        return Err(into_response(
            "Registration rejected",
            HubError::validation("Username already registered"),
        ));
    }

    let email_taken = db::users::find_by_email(&app_state.db_pool, email)
        .await
        .map_err(|e| into_response("Failed to look up email", e))?
        .is_some();
    if email_taken {
        return Err(into_response(
            "Registration rejected",
            HubError::validation("Email already registered"),
        ));
    }

    let password_hash = password::hash_password(&request.password)
        .map_err(|e| into_response("Failed to hash password", e))?;

    let user = db::users::create(
        &app_state.db_pool,
        username,
        email,
        &password_hash,
        UserRole::User,
    )
    .await
    .map_err(|e| match e {
        // 同時登録で一意制約に当たった場合も重複として扱う
        HubError::Conflict(msg) => into_response("Registration rejected", HubError::validation(msg)),
        other => into_response("Failed to create user", other),
    })?;

    invalidate_admin_stats(&app_state).await;
    app_state
        .audit_log
        .log_action(&user, actions::REGISTER, EntityType::User, Some(user.id), None)
        .await;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login - ログイン
///
/// 2FAが有効ならコードを送信し、検証待ちの仮トークンを返す。
///
/// # Returns
/// * `200 OK` - トークン
/// * `401 Unauthorized` - ユーザー名またはパスワードが違う
/// * `502 Bad Gateway` - 2FAコードの送信失敗
pub async fn login(
    State(app_state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, Response> {
    let invalid = || {
        into_response(
            "Login rejected",
            HubError::Authentication("Incorrect username or password".to_string()),
        )
    };

    let user = db::users::find_by_username(&app_state.db_pool, &request.username)
        .await
        .map_err(|e| into_response("Failed to find user", e))?
        .ok_or_else(invalid)?;

    let is_valid = password::verify_password(&request.password, &user.password_hash)
        .map_err(|e| into_response("Failed to verify password", e))?;
    if !is_valid {
        tracing::warn!(username = %request.username, "Login failed: wrong password");
        return Err(invalid());
    }

    if user.requires_two_factor() {
        two_factor::issue_code(
            app_state.cache.as_ref(),
            app_state.notifier.as_ref(),
            &user,
            app_state.config.two_factor_ttl,
        )
        .await
        .map_err(|e| into_response("Failed to issue 2FA code", e))?;

        let token = jwt::create_pending_jwt(user.id, user.role, &app_state.jwt_secret)
            .map_err(|e| into_response("Failed to create pending JWT", e))?;

        tracing::info!(user_id = user.id, "Login awaiting 2FA verification");
        return Ok(Json(TokenResponse::bearer(token, true)));
    }

    let token = issue_full_token(&app_state, &user).await?;
    app_state
        .audit_log
        .log_action(&user, actions::LOGIN, EntityType::User, Some(user.id), None)
        .await;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(TokenResponse::bearer(token, false)))
}

async fn issue_full_token(app_state: &AppState, user: &User) -> Result<String, Response> {
    let token = jwt::create_jwt(
        user.id,
        user.role,
        &app_state.jwt_secret,
        app_state.config.token_expire_minutes,
    )
    .map_err(|e| into_response("Failed to create JWT", e))?;

    if let Err(e) = db::users::touch_last_login(&app_state.db_pool, user.id).await {
        tracing::warn!(user_id = user.id, "Failed to record last login: {}", e);
    }
    Ok(token)
}

/// POST /api/auth/verify-2fa - 2FAコード検証（仮トークン必須）
///
/// # Returns
/// * `200 OK` - 通常のアクセストークン
/// * `400 Bad Request` - コードが無い・期限切れ
/// * `401 Unauthorized` - コード不一致
pub async fn verify_two_factor(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<VerifyTwoFactorRequest>,
) -> Result<impl IntoResponse, Response> {
    two_factor::verify_code(app_state.cache.as_ref(), user.id, &request.code)
        .await
        .map_err(|e| into_response("2FA verification failed", e))?;

    let token = issue_full_token(&app_state, &user).await?;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::TWO_FACTOR_VERIFIED,
            EntityType::User,
            Some(user.id),
            None,
        )
        .await;

    tracing::info!(user_id = user.id, "2FA verification succeeded");
    Ok(Json(TokenResponse::bearer(token, false)))
}

/// POST /api/auth/enable-2fa - Telegramによる2FAを有効化
pub async fn enable_two_factor(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<EnableTwoFactorRequest>,
) -> Result<impl IntoResponse, Response> {
    let chat_id = request.telegram_chat_id.trim();
    if chat_id.is_empty() {
        return Err(into_response(
            "Invalid 2FA setup",
            HubError::validation("Invalid Telegram chat ID"),
        ));
    }

    let is_valid = app_state
        .notifier
        .verify_chat_id(chat_id)
        .await
        .map_err(|e| into_response("Failed to verify Telegram chat ID", e))?;
    if !is_valid {
        return Err(into_response(
            "Invalid 2FA setup",
            HubError::validation("Invalid Telegram chat ID"),
        ));
    }

    let updated = db::users::set_two_factor(&app_state.db_pool, user.id, true, Some(chat_id))
        .await
        .map_err(|e| into_response("Failed to enable 2FA", e))?;

    invalidate_admin_stats(&app_state).await;
    app_state
        .audit_log
        .log_action(
            &updated,
            actions::SETUP_2FA,
            EntityType::User,
            Some(updated.id),
            Some(json!({ "method": "telegram" })),
        )
        .await;

    Ok(Json(updated))
}

/// POST /api/auth/disable-2fa - 2FAを無効化
pub async fn disable_two_factor(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, Response> {
    let updated = db::users::set_two_factor(&app_state.db_pool, user.id, false, None)
        .await
        .map_err(|e| into_response("Failed to disable 2FA", e))?;

    invalidate_admin_stats(&app_state).await;
    app_state
        .audit_log
        .log_action(
            &updated,
            actions::DISABLE_2FA,
            EntityType::User,
            Some(updated.id),
            None,
        )
        .await;

    Ok(Json(updated))
}

/// GET /api/auth/me - 認証中のユーザー
pub async fn me(Extension(user): Extension<User>) -> impl IntoResponse {
    Json(user)
}

/// POST /api/auth/change-password - パスワード変更
///
/// # Returns
/// * `200 OK` - 変更成功
/// * `400 Bad Request` - 未入力、現在のパスワード不一致、新パスワードが短い
pub async fn change_password(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, Response> {
    let (Some(current), Some(new)) = (
        request.current_password.filter(|p| !p.is_empty()),
        request.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(into_response(
            "Invalid password change",
            HubError::validation("Current password and new password are required"),
        ));
    };

    let matches = password::verify_password(&current, &user.password_hash)
        .map_err(|e| into_response("Failed to verify password", e))?;
    if !matches {
        return Err(into_response(
            "Invalid password change",
            HubError::validation("Current password is incorrect"),
        ));
    }
    password::validate_new_password(&new).map_err(|e| into_response("Invalid password change", e))?;

    let password_hash =
        password::hash_password(&new).map_err(|e| into_response("Failed to hash password", e))?;
    db::users::update_password(&app_state.db_pool, user.id, &password_hash)
        .await
        .map_err(|e| into_response("Failed to update password", e))?;

    app_state
        .audit_log
        .log_action(
            &user,
            actions::CHANGE_PASSWORD,
            EntityType::User,
            Some(user.id),
            None,
        )
        .await;

    Ok(Json(json!({ "message": "Password changed successfully" })))
}
