//! Database row types — these map directly to SQLite rows.
//! Ids and timestamps stay as TEXT here; the API layer parses them
//! into Uuid / DateTime when shaping responses.

#[derive(Debug)]
pub struct AccountRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<bool>,
    pub role: String,
    pub active: bool,
}

#[derive(Debug)]
pub struct PostRow {
    pub id: String,
    pub account_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub product_id: Option<String>,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category_id: String,
    pub category_name: String,
}

#[derive(Debug)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug)]
pub struct CommentRow {
    pub id: String,
    pub post_id: String,
    pub account_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ReactionRow {
    pub id: String,
    pub post_id: String,
    pub account_id: String,
    pub kind: i64,
}

#[derive(Debug)]
pub struct PollRow {
    pub id: String,
    pub post_id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub is_closed: bool,
}

#[derive(Debug)]
pub struct PollOptionRow {
    pub id: String,
    pub poll_id: String,
    pub option_text: String,
    pub vote_count: i64,
}

#[derive(Debug)]
pub struct PollResponseRow {
    pub id: String,
    pub poll_id: String,
    pub option_id: String,
    pub account_id: String,
}

#[derive(Debug)]
pub struct RoomRow {
    pub id: String,
    pub first_user: String,
    pub second_user: String,
    pub last_message_at: Option<String>,
    pub seen: bool,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}
