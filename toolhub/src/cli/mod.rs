//! toolhubのCLI
//!
//! サブコマンド無しでも環境変数の設定でサーバーを起動する。

pub mod serve;

use clap::{Parser, Subcommand};

/// toolhub - Tool catalog backend with moderation, ratings and comments
#[derive(Parser, Debug)]
#[command(name = "toolhub")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    TOOLHUB_HOST                   Bind address (default: 0.0.0.0)
    TOOLHUB_PORT                   Listen port (default: 8000)
    TOOLHUB_LOG_LEVEL              Log level (default: info)
    TOOLHUB_LOG_DIR                Also write daily log files to this directory
    TOOLHUB_DATA_DIR               Data directory (default: ~/.toolhub)
    TOOLHUB_DATABASE_URL           Database URL (default: sqlite:<data dir>/toolhub.db)
    TOOLHUB_JWT_SECRET             JWT signing key (auto-generated if not set)
    TOOLHUB_TOKEN_EXPIRE_MINUTES   Access token lifetime (default: 1440)
    TOOLHUB_CACHE_TTL_SECS         Read cache expiry (default: 300)
    TOOLHUB_TWO_FACTOR_TTL_SECS    2FA code expiry (default: 300)
    TOOLHUB_TELEGRAM_BOT_TOKEN     Telegram bot token for 2FA codes
    TOOLHUB_ADMIN_USERNAME         Initial admin username (default: admin)
    TOOLHUB_ADMIN_EMAIL            Initial admin email (default: admin@localhost)
    TOOLHUB_ADMIN_PASSWORD         Initial admin password (admin is created when set)
    TOOLHUB_CORS_ORIGINS           Comma separated allowed origins (default: *)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the toolhub server
    Serve(serve::ServeArgs),
}
