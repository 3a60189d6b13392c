//! toolhub Server Entry Point

use clap::Parser;
use toolhub::cli::{Cli, Commands};
use toolhub::config::Settings;
use toolhub::{bootstrap, logging, server};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init() {
        eprintln!("Error: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let mut settings = Settings::from_env();
    match cli.command {
        Some(Commands::Serve(args)) => args.apply(&mut settings),
        None => {
            // サブコマンド無しは環境変数の設定で起動
        }
    }

    if let Err(e) = run_server(settings).await {
        tracing::error!("Server terminated with error: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let state = bootstrap::initialize(&settings).await?;
    server::run(state, &settings.bind_addr(), &settings.cors_origins).await
}
