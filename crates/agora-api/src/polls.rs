use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use agora_db::StoreError;
use agora_db::models::PollRow;
use agora_policy::{Action, authorize};
use agora_types::api::{
    AddPollOptionRequest, CastVoteRequest, CastVoteResponse, Claims, CreatePollRequest,
    PollOptionResponse, PollResponseBody,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{ensure, parse_id, principal};

/// Polls are curated surveys; creating one is an admin action.
pub async fn create_poll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure(authorize(&principal(&claims), &Action::CreatePoll))?;

    if req.end_time <= req.start_time {
        return Err(ApiError::BadRequest(
            "poll must end after it starts".into(),
        ));
    }

    let poll_id = Uuid::new_v4();
    state.db.create_poll(
        &poll_id.to_string(),
        &req.post_id.to_string(),
        &req.title,
        req.start_time,
        req.end_time,
        &req.options,
    )?;

    let body = load_poll(&state, &poll_id.to_string())?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let body = load_poll(&state, &poll_id.to_string())?;
    Ok(Json(body))
}

pub async fn add_option(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddPollOptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure(authorize(&principal(&claims), &Action::ManagePollOptions))?;

    let option_id = Uuid::new_v4();
    state
        .db
        .add_poll_option(&option_id.to_string(), &poll_id.to_string(), &req.option_text)?;

    let body = load_poll(&state, &poll_id.to_string())?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CastVoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.db.cast_vote(
        &poll_id.to_string(),
        &claims.sub.to_string(),
        &req.option_id.to_string(),
        Utc::now(),
    )?;
    Ok(Json(CastVoteResponse { outcome }))
}

/// One-way transition. Allowed to the owner of the post the poll
/// hangs off, or an admin.
pub async fn close_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let poll = state
        .db
        .get_poll(&poll_id.to_string())?
        .ok_or(StoreError::NotFound("poll"))?;
    let post_owner = state.db.require_post_owner(&poll.post_id)?;

    ensure(authorize(
        &principal(&claims),
        &Action::ClosePoll {
            post_owner: parse_id(&post_owner)?,
        },
    ))?;

    state.db.close_poll(&poll_id.to_string())?;
    let body = load_poll(&state, &poll_id.to_string())?;
    Ok(Json(body))
}

fn load_poll(state: &AppState, poll_id: &str) -> Result<PollResponseBody, ApiError> {
    let poll = state
        .db
        .get_poll(poll_id)?
        .ok_or(StoreError::NotFound("poll"))?;
    let options = state.db.list_poll_options(poll_id)?;
    to_response(poll, options)
}

fn to_response(
    poll: PollRow,
    options: Vec<agora_db::models::PollOptionRow>,
) -> Result<PollResponseBody, ApiError> {
    Ok(PollResponseBody {
        id: parse_id(&poll.id)?,
        post_id: parse_id(&poll.post_id)?,
        title: poll.title,
        start_time: poll.start_time,
        end_time: poll.end_time,
        is_closed: poll.is_closed,
        options: options
            .into_iter()
            .map(|o| {
                Ok(PollOptionResponse {
                    id: parse_id(&o.id)?,
                    option_text: o.option_text,
                    vote_count: o.vote_count,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?,
    })
}
