use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use agora_db::Database;
use agora_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use agora_types::models::Role;

use crate::error::ApiError;
use crate::parse_id;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest(
            "username must be 3-32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::BadRequest(format!("unusable password: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    let account_id = Uuid::new_v4();

    // Username/phone collisions surface as Conflict from the store.
    state.db.create_account(
        &user_id.to_string(),
        &req.username,
        &password_hash,
        &account_id.to_string(),
        req.phone_number.as_deref(),
        req.date_of_birth.as_deref(),
        req.gender,
        Role::User,
    )?;

    let token = create_token(&state.jwt_secret, account_id, &req.username, Role::User)
        .map_err(|_| ApiError::BadRequest("token creation failed".into()))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { account_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (account, password) = state
        .db
        .get_account_by_username(&req.username)?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&password).map_err(|_| ApiError::Unauthorized)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    if !account.active {
        return Err(ApiError::Forbidden);
    }

    let role = Role::parse(&account.role).unwrap_or(Role::User);
    let account_id = parse_id(&account.id)?;

    let token = create_token(&state.jwt_secret, account_id, &account.username, role)
        .map_err(|_| ApiError::Unauthorized)?;

    Ok(Json(LoginResponse {
        account_id,
        username: account.username,
        role,
        token,
    }))
}

fn create_token(
    secret: &str,
    account_id: Uuid,
    username: &str,
    role: Role,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: account_id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"correct horse battery", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"correct horse battery", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong password", &parsed)
                .is_err()
        );
    }
}
