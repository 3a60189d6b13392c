//! Telegram Bot API経由の通知

use super::{code_message, TwoFactorNotifier};
use crate::common::error::HubError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Bot API呼び出しのタイムアウト
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot APIの共通レスポンス
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Botを使う通知先
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl TelegramNotifier {
    /// 新しい通知先を作成
    ///
    /// # Arguments
    /// * `client` - 共有HTTPクライアント
    /// * `base_url` - Bot APIのベースURL（例: `https://api.telegram.org`）
    /// * `bot_token` - Botトークン
    pub fn new(client: reqwest::Client, base_url: &str, bot_token: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<ApiReply, HubError> {
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| HubError::Notifier(format!("Telegram {} request failed: {}", method, e)))?;

        // Bot APIはエラー時も`{"ok": false, ...}`を返す
        response
            .json::<ApiReply>()
            .await
            .map_err(|e| HubError::Notifier(format!("Invalid Telegram {} reply: {}", method, e)))
    }
}

#[async_trait]
impl TwoFactorNotifier for TelegramNotifier {
    async fn send_code(&self, chat_id: &str, code: &str, ttl: Duration) -> Result<(), HubError> {
        let reply = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": code_message(code, ttl) }),
            )
            .await?;

        if reply.ok {
            tracing::info!(chat_id, "2FA code sent via Telegram");
            Ok(())
        } else {
            Err(HubError::Notifier(format!(
                "Telegram rejected sendMessage: {}",
                reply.description.unwrap_or_default()
            )))
        }
    }

    async fn verify_chat_id(&self, chat_id: &str) -> Result<bool, HubError> {
        let reply = self.call("getChat", json!({ "chat_id": chat_id })).await?;
        if !reply.ok {
            tracing::debug!(
                chat_id,
                "Telegram getChat refused: {}",
                reply.description.unwrap_or_default()
            );
        }
        Ok(reply.ok)
    }
}
