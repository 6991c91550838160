use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{auth::Identity, models::Message, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one))
        .route("/{id}/read", patch(mark_read))
}

// Messages are visible to their two endpoints only; staff get no special
// view here.
#[debug_handler]
async fn list(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Vec<Message>>> {
    let messages: Vec<Message> = sqlx::query_as(
        "SELECT * FROM messages WHERE sender_id=? OR receiver_id=? \
         ORDER BY created_at DESC, id DESC",
    )
    .bind(ident.user_id)
    .bind(ident.user_id)
    .fetch_all(&db_pool)
    .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
struct MessageCreate {
    receiver_id: i64,
    content: String,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<MessageCreate>,
) -> AppResult<(StatusCode, Json<Message>)> {
    if body.content.trim().is_empty() {
        return Err(AppError::validation("content", "may not be blank"));
    }
    let receiver: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id=?")
        .bind(body.receiver_id)
        .fetch_optional(&db_pool)
        .await?;
    if receiver.is_none() {
        return Err(AppError::validation("receiver_id", "unknown user"));
    }

    // sender is always the caller, whatever the payload says
    let id = sqlx::query(
        "INSERT INTO messages (sender_id,receiver_id,content,created_at) VALUES (?,?,?,?)",
    )
    .bind(ident.user_id)
    .bind(body.receiver_id)
    .bind(&body.content)
    .bind(OffsetDateTime::now_utc())
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let message: Message = sqlx::query_as("SELECT * FROM messages WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Message>> {
    let message: Message = sqlx::query_as("SELECT * FROM messages WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    if message.sender_id != ident.user_id && message.receiver_id != ident.user_id {
        return Err(AppError::NotFound);
    }
    Ok(Json(message))
}

#[debug_handler]
async fn mark_read(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Message>> {
    let message: Message = sqlx::query_as("SELECT * FROM messages WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;

    // receiver wins first so a self-addressed note can be marked read
    if message.receiver_id != ident.user_id {
        if message.sender_id == ident.user_id {
            // senders can see the message but only the receiver marks it read
            return Err(AppError::Forbidden);
        }
        return Err(AppError::NotFound);
    }

    sqlx::query("UPDATE messages SET is_read=1 WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;

    let message: Message = sqlx::query_as("SELECT * FROM messages WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(message))
}
