pub mod auth;
pub mod bookings;
pub mod community;
pub mod config;
pub mod db;
pub mod error;
pub mod favorites;
pub mod forum;
pub mod hostels;
pub mod maintenance;
pub mod messages;
pub mod models;
pub mod policy;
pub mod profiles;
pub mod reviews;
pub mod rooms;
pub mod search;
pub mod session;
pub mod universities;

use axum::{
    debug_handler, extract::FromRef, response::IntoResponse, routing::get, Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use error::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

/// The full application, shared between `main` and the integration tests.
pub fn app(state: AppState) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(30)));

    Router::new()
        .route("/test", get(test))
        .route("/search", get(search::search))
        .merge(auth::router())
        .nest("/profiles", profiles::router())
        .nest("/hostels", hostels::router())
        .nest("/rooms", rooms::router())
        .nest("/bookings", bookings::router())
        .nest("/reviews", reviews::router())
        .nest("/favorites", favorites::router())
        .nest("/messages", messages::router())
        .nest("/maintenance-requests", maintenance::router())
        .nest("/forum-topics", forum::topics_router())
        .nest("/forum-posts", forum::posts_router())
        .nest("/universities", universities::router())
        .nest("/community-categories", community::categories_router())
        .nest("/community-posts", community::posts_router())
        .nest("/community-comments", community::comments_router())
        .with_state(state)
        .layer(session_layer)
        .layer(CorsLayer::permissive())
}

#[debug_handler]
async fn test() -> impl IntoResponse {
    Json(json!({"message": "hostelhub API is up", "status": "success"}))
}
