use crate::api::AppState;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    response::IntoResponse,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// Gateway handshake: the credential is validated before the upgrade, so
/// an invalid connection fails fast with 401 instead of hanging.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.verifier.verify(&params.token) {
        Ok(identity) => {
            let gateway = state.gateway_service.clone();
            let shutdown_rx = state.shutdown_rx.clone();
            ws.on_upgrade(move |socket| async move {
                gateway.handle_socket(socket, identity.id, shutdown_rx).await;
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            axum::http::StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
