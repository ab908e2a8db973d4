use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use agora_db::StoreError;
use agora_db::models::AccountRow;
use agora_policy::{Action, authorize};
use agora_types::api::{AccountResponse, Claims, UpdateAccountRequest};
use agora_types::models::Role;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::{ensure, parse_id, principal};

pub async fn current_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .get_account(&claims.sub.to_string())?
        .ok_or(StoreError::NotFound("account"))?;
    Ok(Json(to_response(account)?))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .get_account(&account_id.to_string())?
        .filter(|a| a.active)
        .ok_or(StoreError::NotFound("account"))?;
    Ok(Json(to_response(account)?))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.db.list_accounts(200)?;
    let body = accounts
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(body))
}

pub async fn update_current_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure(authorize(
        &principal(&claims),
        &Action::UpdateAccount { owner: claims.sub },
    ))?;

    state.db.update_account(
        &claims.sub.to_string(),
        req.phone_number.as_deref(),
        req.date_of_birth.as_deref(),
        req.gender,
    )?;

    let account = state
        .db
        .get_account(&claims.sub.to_string())?
        .ok_or(StoreError::NotFound("account"))?;
    Ok(Json(to_response(account)?))
}

fn to_response(row: AccountRow) -> Result<AccountResponse, ApiError> {
    Ok(AccountResponse {
        id: parse_id(&row.id)?,
        username: row.username,
        role: Role::parse(&row.role).unwrap_or(Role::User),
        phone_number: row.phone_number,
        date_of_birth: row.date_of_birth,
        gender: row.gender,
    })
}
