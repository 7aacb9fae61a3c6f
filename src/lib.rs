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

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod push;
pub mod realtime;
pub mod services;
pub mod storage;
pub mod telemetry;

use crate::api::ServiceContainer;
use crate::auth::{IdentityVerifier, JwtVerifier};
use crate::config::Config;
use crate::push::PushProvider;
use crate::realtime::{Broadcaster, Hub, PresenceTracker};
use crate::services::gateway::GatewayService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::services::room_service::RoomService;
use crate::storage::DbPool;
use crate::storage::message_repo::MessageRepository;
use crate::storage::notification_repo::NotificationRepository;
use crate::storage::room_repo::RoomRepository;
use std::sync::Arc;
use tokio::sync::watch;

/// Wires the service graph over one pool, one hub, and one presence
/// tracker. The hub doubles as the broadcaster capability injected into
/// every service.
#[must_use]
pub fn wire_services(
    pool: DbPool,
    config: &Config,
    push_provider: Arc<dyn PushProvider>,
) -> ServiceContainer {
    let hub = Arc::new(Hub::new());
    let presence = Arc::new(PresenceTracker::new());
    let broadcaster: Arc<dyn Broadcaster> = hub.clone();

    let message_service = MessageService::new(
        MessageRepository::new(pool.clone()),
        Arc::clone(&broadcaster),
        config.uploads.public_base.clone(),
    );
    let room_service = RoomService::new(
        RoomRepository::new(pool.clone()),
        Arc::clone(&broadcaster),
        config.uploads.public_base.clone(),
    );
    let notification_service = NotificationService::new(
        NotificationRepository::new(pool),
        push_provider,
        Arc::clone(&broadcaster),
    );
    let gateway_service = GatewayService::new(
        hub,
        presence,
        message_service.clone(),
        room_service.clone(),
        config.websocket.clone(),
    );

    let verifier: Arc<dyn IdentityVerifier> =
        Arc::new(JwtVerifier::new(config.auth.jwt_secret.clone()));

    ServiceContainer { verifier, message_service, room_service, notification_service, gateway_service }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
