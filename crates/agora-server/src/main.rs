use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use agora_api::auth::{self, AppState, AppStateInner};
use agora_api::middleware::require_auth;
use agora_api::{accounts, comments, polls, posts, rooms};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("AGORA_DB_PATH").unwrap_or_else(|_| "agora.db".into());
    let host = std::env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("AGORA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = agora_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        // Accounts
        .route("/accounts", get(accounts::list_accounts))
        .route(
            "/accounts/me",
            get(accounts::current_account).patch(accounts::update_current_account),
        )
        .route("/accounts/me/posts", get(posts::current_account_posts))
        .route("/accounts/{account_id}", get(accounts::get_account))
        // Posts & feed
        .route("/feed", get(posts::feed))
        .route("/posts", post(posts::create_post))
        .route("/posts/stats", get(posts::post_statistics))
        .route(
            "/posts/{post_id}",
            get(posts::get_post)
                .patch(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/posts/{post_id}/like", post(posts::toggle_like))
        .route(
            "/posts/{post_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        // Marketplace
        .route("/categories", get(posts::list_categories))
        .route("/categories/{category_id}/posts", get(posts::posts_by_category))
        // Polls
        .route("/polls", post(polls::create_poll))
        .route("/polls/{poll_id}", get(polls::get_poll))
        .route("/polls/{poll_id}/options", post(polls::add_option))
        .route("/polls/{poll_id}/vote", post(polls::cast_vote))
        .route("/polls/{poll_id}/close", post(polls::close_poll))
        // Chat
        .route("/rooms", get(rooms::list_rooms).post(rooms::open_room))
        .route(
            "/rooms/{room_id}/messages",
            get(rooms::get_messages).post(rooms::send_message),
        )
        .route("/rooms/{room_id}/seen", post(rooms::mark_seen))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Agora server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
