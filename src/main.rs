mod app_state;
mod config;
mod console;
mod core;
mod feed;
mod remote;
mod session;
#[cfg(test)]
mod test_support;
mod web;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use app_state::{AppState, ConsoleController};
use config::AppConfig;
use console::ConsoleView;
use feed::{FeedFault, FeedPlayer};
use remote::http::HttpRemoteCamera;
use session::{CameraSessionController, SessionTiming};
use tokio::{sync::mpsc, time::timeout};
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

const BEACON_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env()?;

    tokio::fs::create_dir_all("logs").await?;
    let file_appender = rolling::daily("logs", "camera-console.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let remote = HttpRemoteCamera::new(config.remote_base_url.clone())?;
    let (fault_tx, fault_rx) = mpsc::channel::<FeedFault>(16);
    let player = FeedPlayer::new(remote.client().clone(), fault_tx);
    let view = Arc::new(ConsoleView::new(player, config.notice_duration));
    let controller = Arc::new(CameraSessionController::new(
        remote,
        view,
        config.camera_index,
        SessionTiming::from_config(&config),
    ));
    tokio::spawn(controller.clone().forward_feed_faults(fault_rx));

    let state = Arc::new(AppState::new(config.clone(), controller.clone()));
    let app = web::routes::build_router(state);

    info!(
        "{} listening on {} (remote camera service: {})",
        config.app_name, config.bind_addr, config.remote_base_url
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(release_on_shutdown(controller))
        .await?;

    Ok(())
}

/// Shutdown is this process's page unload: a live camera gets a release
/// beacon before the server goes away.
async fn release_on_shutdown(controller: Arc<ConsoleController>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }

    info!("shutdown requested");
    if let Some(beacon) = controller.unload().await {
        if timeout(BEACON_GRACE, beacon).await.is_err() {
            warn!("release beacon still in flight at shutdown");
        }
    }
}
