//! 2FAコードの送信経路
//!
//! 外部メッセンジャーは`TwoFactorNotifier`トレイトの背後に置く。
//! 本番はTelegram Bot API、Botトークン未設定時は`UnconfiguredNotifier`を使う。

pub mod telegram;

use crate::common::error::HubError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use telegram::TelegramNotifier;

/// 2FAコードを利用者へ届ける通知先
#[async_trait]
pub trait TwoFactorNotifier: Send + Sync {
    /// 指定chat IDへコードを送信する（`ttl`はコードの有効期間）
    async fn send_code(&self, chat_id: &str, code: &str, ttl: Duration) -> Result<(), HubError>;

    /// chat IDが送信可能な宛先か確認する
    async fn verify_chat_id(&self, chat_id: &str) -> Result<bool, HubError>;
}

/// 共有通知ハンドル
pub type SharedNotifier = Arc<dyn TwoFactorNotifier>;

/// Botトークンが無い環境用の通知先
///
/// 送信は常に失敗し、どのchat IDも有効と判定しない。
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredNotifier;

#[async_trait]
impl TwoFactorNotifier for UnconfiguredNotifier {
    async fn send_code(&self, chat_id: &str, _code: &str, _ttl: Duration) -> Result<(), HubError> {
        tracing::warn!(chat_id, "2FA code requested but no Telegram bot token is configured");
        Err(HubError::Notifier(
            "Telegram bot token is not configured".to_string(),
        ))
    }

    async fn verify_chat_id(&self, _chat_id: &str) -> Result<bool, HubError> {
        Ok(false)
    }
}

/// 設定に応じた通知先を作る
pub fn from_settings(settings: &crate::config::Settings) -> SharedNotifier {
    match &settings.telegram_bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(
            reqwest::Client::new(),
            &settings.telegram_api_url,
            token,
        )),
        None => {
            tracing::warn!("TOOLHUB_TELEGRAM_BOT_TOKEN not set, two-factor login is unavailable");
            Arc::new(UnconfiguredNotifier)
        }
    }
}

/// 2FAコード送信メッセージ本文
pub fn code_message(code: &str, ttl: Duration) -> String {
    format!(
        "Your toolhub verification code: {}\nThe code expires in {}.",
        code,
        describe_ttl(ttl)
    )
}

fn describe_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}
