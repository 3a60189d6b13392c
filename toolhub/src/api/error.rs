//! APIエラーレスポンス
//!
//! `HubError`を`{"error": message}`形式のJSONレスポンスに変換する。

use crate::common::error::HubError;
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub HubError);

impl From<HubError> for AppError {
    fn from(err: HubError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // 内部エラーの詳細はexternal_message()で伏せ、ログにのみ残す
        let status = self.0.status_code();
        let payload = json!({
            "error": self.0.external_message()
        });

        (status, Json(payload)).into_response()
    }
}

/// ハンドラー内のエラーをログ出力してレスポンスに変換する
///
/// サーバー側の障害はerror、利用者起因はdebugで記録する。
pub(crate) fn into_response(context: &str, err: HubError) -> Response {
    if err.is_server_error() {
        tracing::error!("{}: {}", context, err);
    } else {
        tracing::debug!("{}: {}", context, err);
    }
    AppError(err).into_response()
}
