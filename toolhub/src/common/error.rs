//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! `HubError`は`error_type()`と`status_code()`を提供し、
//! APIレスポンスへの変換は`api::error::AppError`が担う。

use axum::http::StatusCode;
use thiserror::Error;

/// 共通レイヤーのエラー型
#[derive(Debug, Error)]
pub enum CommonError {
    /// 設定エラー
    #[error("Configuration error: {0}")]
    Config(String),

    /// シリアライズエラー
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 入力検証エラー
    #[error("{0}")]
    Validation(String),
}

/// toolhubのエラー型
#[derive(Debug, Error)]
pub enum HubError {
    /// 共通レイヤーのエラー
    #[error(transparent)]
    Common(#[from] CommonError),

    /// リソースが存在しない
    #[error("{0}")]
    NotFound(String),

    /// 認証エラー
    #[error("{0}")]
    Authentication(String),

    /// 認可エラー
    #[error("{0}")]
    Authorization(String),

    /// 競合（一意制約違反など）
    #[error("{0}")]
    Conflict(String),

    /// データベースエラー
    #[error("Database error: {0}")]
    Database(String),

    /// パスワードハッシュエラー
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// JWTエラー
    #[error("JWT error: {0}")]
    Jwt(String),

    /// キャッシュバックエンドのエラー
    #[error("Cache error: {0}")]
    Cache(String),

    /// 通知（Telegram）送信エラー
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// 内部エラー
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// 入力検証エラーを作成
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Common(CommonError::Validation(message.into()))
    }

    /// 外部クライアントに返すメッセージ
    ///
    /// 利用者起因のエラーは本文をそのまま返し、内部エラーは詳細を伏せた
    /// 定型メッセージを返す。詳細は`Display`経由でサーバーログにのみ出す。
    pub fn external_message(&self) -> String {
        match self {
            Self::Common(CommonError::Validation(msg)) => msg.clone(),
            Self::Common(_) => "Request error".to_string(),
            Self::NotFound(msg)
            | Self::Authentication(msg)
            | Self::Authorization(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Database(_) => "Database error".to_string(),
            Self::PasswordHash(_) => "Internal server error".to_string(),
            Self::Jwt(_) => "Could not validate credentials".to_string(),
            Self::Cache(_) => "Cache unavailable".to_string(),
            Self::Notifier(_) => "Failed to send 2FA code".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// エラー種別の文字列
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Common(_) => "invalid_request_error",
            Self::NotFound(_) => "not_found_error",
            Self::Authentication(_) | Self::Jwt(_) => "authentication_error",
            Self::Authorization(_) => "permission_error",
            Self::Conflict(_) => "conflict_error",
            Self::Notifier(_) => "service_unavailable",
            Self::Database(_) | Self::PasswordHash(_) | Self::Cache(_) | Self::Internal(_) => {
                "server_error"
            }
        }
    }

    /// HTTPステータスコード
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Common(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Authentication(_) | Self::Jwt(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Notifier(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::PasswordHash(_) | Self::Cache(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// サーバー側の障害か（ログをerrorレベルで出すかの判定に使う）
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<sqlx::Error> for HubError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result型エイリアス
pub type HubResult<T> = Result<T, HubError>;
