//! JWT秘密鍵管理
//!
//! 環境変数`TOOLHUB_JWT_SECRET`（旧名`SECRET_KEY`）を優先し、
//! 未設定ならデータディレクトリの`jwt_secret`ファイルを使う。
//! ファイルも無ければ生成して保存する（再起動後もトークンが有効なまま）。

use crate::common::error::{CommonError, HubError};
use crate::config::{data_dir, get_env_with_fallback};
use std::path::Path;

/// 生成する秘密鍵の長さ
const SECRET_LENGTH: usize = 64;

/// 秘密鍵ファイル名
const SECRET_FILE: &str = "jwt_secret";

/// JWT秘密鍵を取得または生成する
pub fn get_or_create_jwt_secret() -> Result<String, HubError> {
    if let Some(secret) = get_env_with_fallback("TOOLHUB_JWT_SECRET", "SECRET_KEY") {
        let secret = secret.trim().to_string();
        if !secret.is_empty() {
            tracing::debug!("Using JWT secret from environment");
            return Ok(secret);
        }
    }

    load_or_create_at(&data_dir().join(SECRET_FILE))
}

/// 指定パスの秘密鍵を読み込み、無ければ生成して保存する
pub fn load_or_create_at(path: &Path) -> Result<String, HubError> {
    if path.exists() {
        let secret = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read {}: {}", path.display(), e)))?;
        let secret = secret.trim().to_string();
        if !secret.is_empty() {
            tracing::debug!("Loaded JWT secret from {}", path.display());
            return Ok(secret);
        }
        tracing::warn!("JWT secret file {} is empty, regenerating", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            config_error(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let secret = crate::auth::generate_random_token(SECRET_LENGTH);
    std::fs::write(path, &secret)
        .map_err(|e| config_error(format!("Failed to write {}: {}", path.display(), e)))?;
    restrict_permissions(path);

    tracing::info!("Generated new JWT secret at {}", path.display());
    Ok(secret)
}

fn config_error(message: String) -> HubError {
    HubError::Common(CommonError::Config(message))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to restrict permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
