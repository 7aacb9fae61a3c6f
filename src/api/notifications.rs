use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::notifications::SubscribeRequest;
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

/// Registers or refreshes a push endpoint for the authenticated user.
pub async fn subscribe(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse> {
    let subscription = state
        .notification_service
        .save_subscription(auth_user.user_id, &payload.endpoint, &payload.keys.p256dh, &payload.keys.auth)
        .await?;

    Ok(Json(subscription))
}

pub async fn list(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let notifications = state.notification_service.list_notifications(auth_user.user_id).await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let count = state.notification_service.get_unread_count(auth_user.user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// Marks one of the caller's notifications as read. A foreign id matches
/// nothing and is silently ignored.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> Result<impl IntoResponse> {
    let unread = state
        .notification_service
        .mark_notification_read(auth_user.user_id, &notification_id)
        .await?;

    Ok(Json(json!({ "unreadCount": unread })))
}
