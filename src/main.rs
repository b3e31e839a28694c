#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::Instrument;
use vitae_server::api::MgmtState;
use vitae_server::config::Config;
use vitae_server::{AppBuilder, Workers, storage, telemetry};

/// Everything the runtime phase needs once booting succeeded.
struct Boot {
    api: (TcpListener, Router),
    mgmt: (TcpListener, Router),
    workers: Workers,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Connects, migrates, wires services and binds both listeners. Nothing is served yet.
async fn boot(config: &Config) -> anyhow::Result<Boot> {
    let pool = storage::init_pool(&config.database).await?;
    vitae_server::run_migrations(&pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    vitae_server::spawn_signal_handler(shutdown_tx.clone());

    let app = AppBuilder::new(config.clone()).with_database(pool).build()?;
    tracing::info!(integrations = ?app.health_service.integrations(), "services wired");

    let api_router = vitae_server::api::app_router(config.clone(), app.services);
    let mgmt_router = vitae_server::api::mgmt_router(MgmtState { health_service: app.health_service });

    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;
    let api_listener = TcpListener::bind(api_addr).await?;
    let mgmt_listener = TcpListener::bind(mgmt_addr).await?;
    tracing::info!(api = %api_addr, mgmt = %mgmt_addr, "listening");

    Ok(Boot { api: (api_listener, api_router), mgmt: (mgmt_listener, mgmt_router), workers: app.workers, shutdown_tx, shutdown_rx })
}

/// Serves `router` until the shutdown flag flips.
async fn serve((listener, router): (TcpListener, Router), mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&stop| stop).await;
        })
        .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;
    vitae_server::setup_panic_hook();

    let Boot { api, mgmt, workers, shutdown_tx, shutdown_rx } = boot(&config).instrument(tracing::info_span!("boot_server")).await?;

    let worker_tasks = workers.spawn_all(shutdown_rx.clone());
    if let Err(e) = tokio::try_join!(serve(api, shutdown_rx.clone()), serve(mgmt, shutdown_rx)) {
        tracing::error!(error = %e, "Server error");
    }

    // Either server stopping takes the workers down with it
    let _ = shutdown_tx.send(true);
    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    if tokio::time::timeout(grace, futures::future::join_all(worker_tasks)).await.is_ok() {
        tracing::info!("Background tasks finished.");
    } else {
        tracing::warn!(grace_secs = grace.as_secs(), "Timeout waiting for background tasks to finish.");
    }

    telemetry_guard.shutdown();
    Ok(())
}
