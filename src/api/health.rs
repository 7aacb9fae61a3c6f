use crate::api::MgmtState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};

pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    match state.health_service.check_db().await {
        Ok(()) => (StatusCode::OK, "ready".to_string()),
        Err(reason) => {
            tracing::warn!(reason = %reason, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, reason)
        }
    }
}
