//! axumサーバー起動・シャットダウンハンドリング

use crate::shutdown::ShutdownController;
use crate::AppState;
use anyhow::Context;
use tracing::{info, warn};

/// axumサーバーを起動し、シャットダウンシグナルを待機する
///
/// # Arguments
/// * `state` - アプリケーション状態
/// * `bind_addr` - `host:port`
/// * `cors_origins` - CORS許可オリジン（`*`で全許可）
pub async fn run(state: AppState, bind_addr: &str, cors_origins: &[String]) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();

    let app = crate::api::create_app_with_cors(state, cors_origins);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("toolhub server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// OSシグナルまたは`ShutdownController`からの要求を待つ
async fn shutdown_signal(shutdown: ShutdownController) {
    let reason = tokio::select! {
        name = os_signal() => {
            // 状態を共有する他のハンドルにも停止を伝える
            shutdown.request_shutdown();
            name
        }
        _ = shutdown.wait() => "shutdown request",
    };
    info!(reason, "Stopping toolhub server");
}

/// Ctrl+C / SIGTERM のどちらかを受け取るまで待ち、受け取ったシグナル名を返す
///
/// ハンドラ登録に失敗したシグナルは待たない。
async fn os_signal() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                warn!("Ctrl+C handler unavailable: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}
