//! 環境変数による設定管理
//!
//! 新しい`TOOLHUB_*`名を優先し、旧名（接頭辞なし）が設定されていれば
//! 非推奨警告を出した上でその値を使う。

use std::path::PathBuf;
use std::time::Duration;

/// 環境変数を旧名へのフォールバック付きで取得する
///
/// # Arguments
/// * `new_name` - 推奨される変数名
/// * `old_name` - 非推奨の変数名
///
/// # Returns
/// * `Some(value)` - どちらかが設定されている
/// * `None` - どちらも未設定
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// `get_env_with_fallback`の結果が無ければデフォルト値を返す
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// `get_env_with_fallback`の結果を型変換する（失敗時はデフォルト値）
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// デフォルトのリッスンポート
pub const DEFAULT_PORT: u16 = 8000;
/// キャッシュエントリのデフォルト有効期間（秒）
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
/// 2FAコードのデフォルト有効期間（秒）
pub const DEFAULT_TWO_FACTOR_TTL_SECS: u64 = 300;
/// アクセストークンのデフォルト有効期間（分）
pub const DEFAULT_TOKEN_EXPIRE_MINUTES: i64 = 24 * 60;
/// Telegram Bot APIのベースURL
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// データディレクトリ（`TOOLHUB_DATA_DIR`、未設定時は`~/.toolhub`）
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TOOLHUB_DATA_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".toolhub"))
        .unwrap_or_else(|_| PathBuf::from(".toolhub"))
}

/// サーバー全体の設定
#[derive(Debug, Clone)]
pub struct Settings {
    /// バインドアドレス
    pub host: String,
    /// リッスンポート
    pub port: u16,
    /// データベースURL
    pub database_url: String,
    /// アクセストークンの有効期間（分）
    pub token_expire_minutes: i64,
    /// 読み取りキャッシュの有効期間
    pub cache_ttl: Duration,
    /// 2FAコードの有効期間
    pub two_factor_ttl: Duration,
    /// Telegram Botトークン（未設定なら2FAコードを送信できない）
    pub telegram_bot_token: Option<String>,
    /// Telegram Bot APIのベースURL
    pub telegram_api_url: String,
    /// CORS許可オリジン（`*`は全許可）
    pub cors_origins: Vec<String>,
}

impl Settings {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        let default_db = format!("sqlite:{}", data_dir().join("toolhub.db").display());

        Self {
            host: get_env_with_fallback_or("TOOLHUB_HOST", "HOST", "0.0.0.0"),
            port: get_env_with_fallback_parse("TOOLHUB_PORT", "PORT", DEFAULT_PORT),
            database_url: get_env_with_fallback_or(
                "TOOLHUB_DATABASE_URL",
                "DATABASE_URL",
                &default_db,
            ),
            token_expire_minutes: get_env_with_fallback_parse(
                "TOOLHUB_TOKEN_EXPIRE_MINUTES",
                "ACCESS_TOKEN_EXPIRE_MINUTES",
                DEFAULT_TOKEN_EXPIRE_MINUTES,
            ),
            cache_ttl: Duration::from_secs(get_env_with_fallback_parse(
                "TOOLHUB_CACHE_TTL_SECS",
                "CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            two_factor_ttl: Duration::from_secs(get_env_with_fallback_parse(
                "TOOLHUB_TWO_FACTOR_TTL_SECS",
                "TWO_FACTOR_TTL_SECS",
                DEFAULT_TWO_FACTOR_TTL_SECS,
            )),
            telegram_bot_token: get_env_with_fallback(
                "TOOLHUB_TELEGRAM_BOT_TOKEN",
                "TELEGRAM_BOT_TOKEN",
            )
            .filter(|token| !token.trim().is_empty()),
            telegram_api_url: get_env_with_fallback_or(
                "TOOLHUB_TELEGRAM_API_URL",
                "TELEGRAM_API_URL",
                DEFAULT_TELEGRAM_API_URL,
            ),
            cors_origins: parse_origins(&get_env_with_fallback_or(
                "TOOLHUB_CORS_ORIGINS",
                "CORS_ORIGINS",
                "*",
            )),
        }
    }

    /// `host:port`形式のバインドアドレス
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
