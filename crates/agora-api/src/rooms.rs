use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use agora_db::StoreError;
use agora_db::models::{MessageRow, RoomRow};
use agora_policy::{Action, authorize};
use agora_types::api::{Claims, MessageResponse, OpenRoomRequest, RoomResponse, SendMessageRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{ensure, parse_id, parse_timestamp, principal};

/// Get-or-create the conversation between the caller and one other
/// account. Calling this with the arguments in either order — or
/// twice concurrently — lands on the same room.
pub async fn open_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = state
        .db
        .find_or_create_room(&claims.sub.to_string(), &req.account_id.to_string())?;
    Ok(Json(to_room_response(room)?))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.db.list_rooms_for(&claims.sub.to_string())?;
    let body = rooms
        .into_iter()
        .map(to_room_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let room = member_room(&state, &room_id, &claims)?;

    let rows = state
        .db
        .list_messages(&room.id, query.limit.min(200), query.before.as_deref())?;
    let body = rows
        .into_iter()
        .map(to_message_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("message content is required".into()));
    }

    let room = member_room(&state, &room_id, &claims)?;

    let message_id = Uuid::new_v4();
    state
        .db
        .insert_message(&message_id.to_string(), &room.id, &claims.sub.to_string(), &req.content)?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            room_id: parse_id(&room.id)?,
            sender_id: claims.sub,
            content: req.content,
            created_at: chrono::Utc::now(),
        }),
    ))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let room = member_room(&state, &room_id, &claims)?;
    state.db.mark_room_seen(&room.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the room and check the caller is one of its two members.
fn member_room(state: &AppState, room_id: &Uuid, claims: &Claims) -> Result<RoomRow, ApiError> {
    let room = state
        .db
        .get_room(&room_id.to_string())?
        .ok_or(StoreError::NotFound("room"))?;

    ensure(authorize(
        &principal(claims),
        &Action::SendMessage {
            first_user: parse_id(&room.first_user)?,
            second_user: parse_id(&room.second_user)?,
        },
    ))?;

    Ok(room)
}

fn to_room_response(row: RoomRow) -> Result<RoomResponse, ApiError> {
    Ok(RoomResponse {
        id: parse_id(&row.id)?,
        first_user: parse_id(&row.first_user)?,
        second_user: parse_id(&row.second_user)?,
        last_message_at: row.last_message_at.as_deref().map(parse_timestamp),
        seen: row.seen,
    })
}

fn to_message_response(row: MessageRow) -> Result<MessageResponse, ApiError> {
    Ok(MessageResponse {
        id: parse_id(&row.id)?,
        room_id: parse_id(&row.room_id)?,
        sender_id: parse_id(&row.sender_id)?,
        content: row.content,
        created_at: parse_timestamp(&row.created_at),
    })
}
