// パスワードハッシュ化と検証（bcrypt実装）

use crate::common::error::HubError;
use bcrypt::{hash, verify};

/// パスワードハッシュ化のコスト
const HASH_COST: u32 = 12;

/// パスワードの最小文字数
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// パスワードをbcryptでハッシュ化
///
/// # Arguments
/// * `password` - ハッシュ化するパスワード
///
/// # Returns
/// * `Ok(String)` - bcryptハッシュ文字列
/// * `Err(HubError)` - ハッシュ化失敗
pub fn hash_password(password: &str) -> Result<String, HubError> {
    hash(password, HASH_COST)
        .map_err(|e| HubError::PasswordHash(format!("Failed to hash password: {}", e)))
}

/// パスワードを検証
///
/// # Returns
/// * `Ok(true)` - パスワード一致
/// * `Ok(false)` - パスワード不一致
/// * `Err(HubError)` - ハッシュ文字列が不正
pub fn verify_password(password: &str, hash: &str) -> Result<bool, HubError> {
    verify(password, hash)
        .map_err(|e| HubError::PasswordHash(format!("Failed to verify password: {}", e)))
}

/// 新しいパスワードの強度を検証
pub fn validate_new_password(password: &str) -> Result<(), HubError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(HubError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
