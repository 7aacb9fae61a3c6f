use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::messages::{Pagination, SearchQuery, SendMessageRequest};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Sends a direct message to another user.
///
/// # Errors
/// Returns `AppError::Validation` if the content is empty after trimming.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state
        .message_service
        .send_direct_message(auth_user.user_id, payload.receiver_id, &payload.content, payload.attachment)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_conversation(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(peer_id): Path<i64>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let messages = state
        .message_service
        .get_conversation(auth_user.user_id, peer_id, page.limit.unwrap_or(50), page.offset.unwrap_or(0))
        .await?;

    Ok(Json(messages))
}

/// Marks everything the peer sent to the caller as read.
pub async fn mark_conversation_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.message_service.mark_messages_as_read(auth_user.user_id, peer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_counts(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let counts = state.message_service.get_unread_counts(auth_user.user_id).await?;
    Ok(Json(counts))
}

pub async fn search(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.search_messages(auth_user.user_id, &query.q).await?;
    Ok(Json(messages))
}

/// Deletes one of the caller's own messages.
///
/// # Errors
/// Returns `AppError::Authorization` if the caller is not the sender.
pub async fn delete_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.message_service.delete_message(message_id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
