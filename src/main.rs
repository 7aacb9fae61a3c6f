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

use huddle_server::api::MgmtState;
use huddle_server::config::Config;
use huddle_server::push::HttpPushProvider;
use huddle_server::services::health_service::HealthService;
use huddle_server::{storage, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    telemetry::init_tracing(config.log_json);

    // Phase 1: infrastructure
    let pool = storage::init_pool(&config.database_url).await?;
    storage::run_migrations(&pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    huddle_server::spawn_signal_handler(shutdown_tx.clone());

    // Phase 2: component wiring
    let push_provider = Arc::new(HttpPushProvider::new(config.push.timeout_secs)?);
    let services = huddle_server::wire_services(pool.clone(), &config, push_provider);

    // Phase 3: listeners and routers
    let app = huddle_server::api::app_router(config.clone(), services, shutdown_rx.clone());
    let mgmt = huddle_server::api::mgmt_router(MgmtState {
        health_service: HealthService::new(pool, config.health.clone()),
    });

    let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

    let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
    let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

    tracing::info!(address = %api_addr, "listening");
    tracing::info!(address = %mgmt_addr, "management server listening");

    // Phase 4: serve until the shutdown signal fires
    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx;
    let mgmt_server = axum::serve(mgmt_listener, mgmt.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    let _ = shutdown_tx.send(true);
    tracing::info!("Shutdown complete");
    Ok(())
}
