use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ReactionState, Role, VoteOutcome};

// -- JWT Claims --

/// JWT claims shared by agora-api (REST middleware) and agora-server.
/// Canonical definition lives here in agora-types; `sub` is the account
/// id, not the credential row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub account_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
    pub token: String,
}

// -- Accounts --

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountRequest {
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<bool>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
    /// Present for marketplace (product) posts, absent for plain posts.
    pub product: Option<NewProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub product: Option<ProductResponse>,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub state: ReactionState,
}

#[derive(Debug, Serialize)]
pub struct MonthlyPostCount {
    pub month: u32,
    pub year: i32,
    pub post_count: i64,
}

// -- Categories --

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub account_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// -- Polls --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePollRequest {
    pub post_id: Uuid,
    pub title: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPollOptionRequest {
    pub option_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub option_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CastVoteResponse {
    pub outcome: VoteOutcome,
}

#[derive(Debug, Serialize)]
pub struct PollResponseBody {
    pub id: Uuid,
    pub post_id: Uuid,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub is_closed: bool,
    pub options: Vec<PollOptionResponse>,
}

#[derive(Debug, Serialize)]
pub struct PollOptionResponse {
    pub id: Uuid,
    pub option_text: String,
    pub vote_count: i64,
}

// -- Rooms --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenRoomRequest {
    pub account_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: Uuid,
    pub first_user: Uuid,
    pub second_user: Uuid,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub seen: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
