// JWT生成と検証（jsonwebtoken実装）

use crate::common::auth::{Claims, UserRole};
use crate::common::error::HubError;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// 2FA仮トークンの有効期間（分）
pub const PENDING_TOKEN_MINUTES: i64 = 5;

fn issue(
    user_id: i64,
    role: UserRole,
    secret: &str,
    expire_minutes: i64,
    two_factor_pending: bool,
) -> Result<String, HubError> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::minutes(expire_minutes))
        .ok_or_else(|| HubError::Jwt("Failed to calculate expiration time".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration,
        two_factor_pending,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| HubError::Jwt(format!("Failed to create JWT: {}", e)))
}

/// アクセストークンを生成
///
/// # Arguments
/// * `user_id` - ユーザーID
/// * `role` - ユーザーロール
/// * `secret` - JWTシークレットキー
/// * `expire_minutes` - 有効期間（分）
pub fn create_jwt(
    user_id: i64,
    role: UserRole,
    secret: &str,
    expire_minutes: i64,
) -> Result<String, HubError> {
    issue(user_id, role, secret, expire_minutes, false)
}

/// 2FAコード検証待ちの仮トークンを生成（有効期間5分）
pub fn create_pending_jwt(user_id: i64, role: UserRole, secret: &str) -> Result<String, HubError> {
    issue(user_id, role, secret, PENDING_TOKEN_MINUTES, true)
}

/// JWTトークンを検証
///
/// # Returns
/// * `Ok(Claims)` - 検証済みクレーム
/// * `Err(HubError::Jwt)` - 無効なトークン、期限切れなど
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, HubError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| HubError::Jwt(format!("Failed to verify JWT: {}", e)))
}
