use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use agora_db::StoreError;
use agora_db::models::CommentRow;
use agora_policy::{Action, authorize};
use agora_types::api::{Claims, CommentResponse, CreateCommentRequest, UpdateCommentRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{ensure, parse_id, parse_timestamp, principal};

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.require_post_owner(&post_id.to_string())?;
    let rows = state.db.list_comments(&post_id.to_string())?;
    let body = rows
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("comment content is required".into()));
    }

    let comment_id = Uuid::new_v4();
    state.db.insert_comment(
        &comment_id.to_string(),
        &post_id.to_string(),
        &claims.sub.to_string(),
        &req.content,
        req.image_url.as_deref(),
    )?;

    let row = state
        .db
        .get_comment(&comment_id.to_string())?
        .ok_or(StoreError::NotFound("comment"))?;
    Ok((StatusCode::CREATED, Json(to_response(row)?)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .db
        .get_comment(&comment_id.to_string())?
        .filter(|c| c.active)
        .ok_or(StoreError::NotFound("comment"))?;

    ensure(authorize(
        &principal(&claims),
        &Action::UpdateComment {
            author: parse_id(&comment.account_id)?,
        },
    ))?;

    state
        .db
        .update_comment(&comment_id.to_string(), &req.content, req.image_url.as_deref())?;

    let row = state
        .db
        .get_comment(&comment_id.to_string())?
        .ok_or(StoreError::NotFound("comment"))?;
    Ok(Json(to_response(row)?))
}

/// Destroy is wider than update: the comment's author, the owner of
/// the post it sits under, or an admin.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = state
        .db
        .get_comment(&comment_id.to_string())?
        .filter(|c| c.active)
        .ok_or(StoreError::NotFound("comment"))?;
    let post = state
        .db
        .get_post(&comment.post_id)?
        .ok_or(StoreError::NotFound("post"))?;

    ensure(authorize(
        &principal(&claims),
        &Action::DestroyComment {
            author: parse_id(&comment.account_id)?,
            post_owner: parse_id(&post.account_id)?,
        },
    ))?;

    state.db.soft_delete_comment(&comment_id.to_string())?;
    Ok(StatusCode::NO_CONTENT)
}

fn to_response(row: CommentRow) -> Result<CommentResponse, ApiError> {
    Ok(CommentResponse {
        id: parse_id(&row.id)?,
        post_id: parse_id(&row.post_id)?,
        account_id: parse_id(&row.account_id)?,
        content: row.content,
        image_url: row.image_url,
        created_at: parse_timestamp(&row.created_at),
    })
}
