use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use agora_db::models::PostRow;
use agora_db::queries::posts::NewProductInsert;
use agora_db::{Database, StoreError};
use agora_policy::{Action, authorize};
use agora_types::api::{
    CategoryResponse, Claims, CreatePostRequest, MonthlyPostCount, PostResponse, ProductResponse,
    ToggleLikeResponse, UpdatePostRequest,
};

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;
use crate::{ensure, parse_id, parse_timestamp, principal};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` of the oldest
    /// post from the previous page to fetch older posts.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    20
}

pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(100);
    let before = query.before;

    // Run the page query plus its batch counts off the async runtime.
    let db = state.clone();
    let responses = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_feed(limit, before.as_deref())?;
        shape_posts(&db, rows)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {e}")))??;

    Ok(Json(responses))
}

pub async fn current_account_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .db
        .list_posts_by_account(&claims.sub.to_string(), 100)?;
    let responses = shape_posts(&state, rows)?;
    Ok(Json(responses))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_post(&post_id.to_string())?
        .filter(|p| p.active)
        .ok_or(StoreError::NotFound("post"))?;
    let mut shaped = shape_posts(&state, vec![row])?;
    Ok(Json(shaped.remove(0)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("post content is required".into()));
    }

    let post_id = Uuid::new_v4();
    let product = req.product.as_ref().map(|p| NewProductInsert {
        name: &p.name,
        description: &p.description,
        price: p.price,
        category: &p.category,
    });

    state.db.create_post(
        &post_id.to_string(),
        &claims.sub.to_string(),
        &req.content,
        req.image_url.as_deref(),
        product,
    )?;

    let row = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(StoreError::NotFound("post"))?;
    let mut shaped = shape_posts(&state, vec![row])?;
    Ok((StatusCode::CREATED, Json(shaped.remove(0))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = state.db.require_post_owner(&post_id.to_string())?;
    ensure(authorize(
        &principal(&claims),
        &Action::UpdatePost {
            owner: parse_id(&owner)?,
        },
    ))?;

    state
        .db
        .update_post(&post_id.to_string(), &req.content, req.image_url.as_deref())?;

    let row = state
        .db
        .get_post(&post_id.to_string())?
        .ok_or(StoreError::NotFound("post"))?;
    let mut shaped = shape_posts(&state, vec![row])?;
    Ok(Json(shaped.remove(0)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = state.db.require_post_owner(&post_id.to_string())?;
    ensure(authorize(
        &principal(&claims),
        &Action::DestroyPost {
            owner: parse_id(&owner)?,
        },
    ))?;

    state.db.soft_delete_post(&post_id.to_string())?;
    Ok(StatusCode::NO_CONTENT)
}

/// The like toggle: at most one reaction row per (post, account),
/// flipped in place by the store.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let state_after = state
        .db
        .toggle_like(&post_id.to_string(), &claims.sub.to_string())?;
    Ok(Json(ToggleLikeResponse { state: state_after }))
}

// -- Categories --

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_categories()?;
    let body = rows
        .into_iter()
        .map(|c| {
            Ok(CategoryResponse {
                id: parse_id(&c.id)?,
                name: c.name,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;
    Ok(Json(body))
}

pub async fn posts_by_category(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_posts_by_category(&category_id.to_string())?;
    let responses = shape_posts(&state, rows)?;
    Ok(Json(responses))
}

// -- Statistics --

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

pub async fn post_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.monthly_post_counts(query.month, query.year)?;
    let body: Vec<MonthlyPostCount> = rows
        .into_iter()
        .map(|(month, year, post_count)| MonthlyPostCount {
            month,
            year,
            post_count,
        })
        .collect();
    Ok(Json(body))
}

/// Attach product details and engagement counts to a page of post rows.
/// Counts come from two batched queries, not one pair per post.
fn shape_posts(state: &Arc<AppStateInner>, rows: Vec<PostRow>) -> Result<Vec<PostResponse>, ApiError> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let like_counts: HashMap<String, i64> =
        state.db.like_counts_for_posts(&ids)?.into_iter().collect();
    let comment_counts: HashMap<String, i64> = state
        .db
        .comment_counts_for_posts(&ids)?
        .into_iter()
        .collect();

    let mut responses = Vec::with_capacity(rows.len());
    for row in rows {
        let product = match &row.product_id {
            Some(product_id) => load_product(&state.db, product_id)?,
            None => None,
        };

        responses.push(PostResponse {
            id: parse_id(&row.id)?,
            account_id: parse_id(&row.account_id)?,
            content: row.content,
            image_url: row.image_url,
            product,
            like_count: like_counts.get(&row.id).copied().unwrap_or(0),
            comment_count: comment_counts.get(&row.id).copied().unwrap_or(0),
            created_at: parse_timestamp(&row.created_at),
        });
    }
    Ok(responses)
}

fn load_product(db: &Database, product_id: &str) -> Result<Option<ProductResponse>, ApiError> {
    let row = db.get_product(product_id)?;
    Ok(match row {
        Some(p) => Some(ProductResponse {
            id: parse_id(&p.id)?,
            name: p.name,
            description: p.description,
            price: p.price,
            category: p.category_name,
        }),
        None => None,
    })
}
