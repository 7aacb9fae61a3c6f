use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::rooms::{AddMembersRequest, CreateRoomRequest, SendRoomMessageRequest};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Creates a room; the caller becomes its creator and an implicit member.
///
/// # Errors
/// Returns `AppError::Validation` if the name is empty after trimming.
pub async fn create_room(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse> {
    let room = state
        .room_service
        .create_room(&payload.name, auth_user.user_id, &payload.member_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn list_rooms(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let rooms = state.room_service.rooms_for_user(auth_user.user_id).await?;
    Ok(Json(rooms))
}

pub async fn delete_room(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.room_service.delete_room(room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_members(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Json(payload): Json<AddMembersRequest>,
) -> Result<impl IntoResponse> {
    let room = state.room_service.add_members(room_id, &payload.user_ids).await?;
    Ok(Json(room))
}

pub async fn remove_member(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    state.room_service.remove_member(room_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Full room history, restricted to members.
pub async fn room_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.room_service.ensure_member(room_id, auth_user.user_id).await?;
    let messages = state.room_service.get_room_messages(room_id).await?;
    Ok(Json(messages))
}

/// Posts a group message. Membership is the authorization boundary.
///
/// # Errors
/// Returns `AppError::Authorization` if the caller is not a member.
pub async fn send_room_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Json(payload): Json<SendRoomMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state
        .room_service
        .send_group_message(room_id, auth_user.user_id, &payload.content, payload.attachment)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_room_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.room_service.mark_group_messages_as_read(room_id, auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_counts(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let counts = state.room_service.get_unread_group_counts(auth_user.user_id).await?;
    Ok(Json(counts))
}
