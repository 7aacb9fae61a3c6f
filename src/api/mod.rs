use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::notification_service::NotificationService;
use crate::services::room_service::RoomService;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod gateway;
pub mod health;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod rooms;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub message_service: MessageService,
    pub room_service: RoomService,
    pub notification_service: NotificationService,
    pub gateway_service: GatewayService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub message_service: MessageService,
    pub room_service: RoomService,
    pub notification_service: NotificationService,
    pub gateway_service: GatewayService,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(
    config: Config,
    services: ServiceContainer,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(u64::from(config.rate_limit.per_second.max(1)))
            .burst_size(config.rate_limit.burst.max(1))
            .finish()
            .expect("Failed to build rate limiter config"),
    );

    let state = AppState {
        config,
        verifier: services.verifier,
        message_service: services.message_service,
        room_service: services.room_service,
        notification_service: services.notification_service,
        gateway_service: services.gateway_service,
        shutdown_rx,
    };

    let api_routes = Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/unread-counts", get(messages::unread_counts))
        .route("/messages/search", get(messages::search))
        .route("/messages/{id}", delete(messages::delete_message))
        .route("/conversations/{peer_id}/messages", get(messages::get_conversation))
        .route("/conversations/{peer_id}/read", post(messages::mark_conversation_read))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/unread-counts", get(rooms::unread_counts))
        .route("/rooms/{id}", delete(rooms::delete_room))
        .route("/rooms/{id}/members", post(rooms::add_members))
        .route("/rooms/{id}/members/{user_id}", delete(rooms::remove_member))
        .route("/rooms/{id}/messages", get(rooms::room_messages))
        .route("/rooms/{id}/messages", post(rooms::send_room_message))
        .route("/rooms/{id}/read", post(rooms::mark_room_read))
        .route("/push/subscriptions", put(notifications::subscribe))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route("/gateway", get(gateway::websocket_handler))
        .layer(GovernorLayer::new(governor_conf));

    Router::new()
        .nest("/v1", api_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %response.status().as_u16(),
                            "request completed"
                        );
                    },
                ),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
