//! ロギング初期化
//!
//! コンソール出力に加え、`TOOLHUB_LOG_DIR`が設定されていれば
//! 日次ローテーションのログファイルにも書き出す。

use crate::config::get_env_with_fallback_or;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// ログファイル名の接頭辞
const LOG_FILE_PREFIX: &str = "toolhub.log";

/// tracingサブスクライバーを初期化する
///
/// フィルタは`RUST_LOG`、`TOOLHUB_LOG_LEVEL`（旧: `LOG_LEVEL`）、`info`の順で決まる。
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = get_env_with_fallback_or("TOOLHUB_LOG_LEVEL", "LOG_LEVEL", "info");
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let console_layer = fmt::layer().with_target(true).with_filter(console_filter);

    let file_layer = match std::env::var("TOOLHUB_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(appender)
                    .with_filter(EnvFilter::new(&level)),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
