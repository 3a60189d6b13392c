//! serve サブコマンド
//!
//! 指定が無い項目は環境変数（`TOOLHUB_HOST`/`TOOLHUB_PORT`など）の値を使う。

use crate::config::Settings;
use clap::Args;

/// serve サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long)]
    pub host: Option<String>,
}

impl ServeArgs {
    /// 引数で指定された値で設定を上書きする
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
    }
}
