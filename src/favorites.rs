use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{
    auth::Identity, error::is_unique_violation, models::Favorite, policy, AppError, AppResult,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", delete(remove))
}

#[debug_handler]
async fn list(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Vec<Favorite>>> {
    let favorites: Vec<Favorite> = match policy::owner_filter(&ident) {
        Some(user_id) => {
            sqlx::query_as("SELECT * FROM favorites WHERE user_id=? ORDER BY created_at DESC, id DESC")
                .bind(user_id)
                .fetch_all(&db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM favorites ORDER BY created_at DESC, id DESC")
                .fetch_all(&db_pool)
                .await?
        }
    };
    Ok(Json(favorites))
}

#[derive(Debug, Deserialize)]
struct FavoriteCreate {
    hostel_id: i64,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<FavoriteCreate>,
) -> AppResult<(StatusCode, Json<Favorite>)> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM hostels WHERE id=?")
        .bind(body.hostel_id)
        .fetch_optional(&db_pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::validation("hostel_id", "unknown hostel"));
    }

    // the (user, hostel) pair is unique; the store enforces it
    let inserted = sqlx::query("INSERT INTO favorites (user_id,hostel_id,created_at) VALUES (?,?,?)")
        .bind(ident.user_id)
        .bind(body.hostel_id)
        .bind(OffsetDateTime::now_utc())
        .execute(&db_pool)
        .await;

    let id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::validation("hostel_id", "already in favorites"));
        }
        Err(err) => return Err(err.into()),
    };

    let favorite: Favorite = sqlx::query_as("SELECT * FROM favorites WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

#[debug_handler]
async fn remove(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let favorite: Favorite = sqlx::query_as("SELECT * FROM favorites WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let favorite = policy::visible_to(&ident, favorite.user_id, favorite)?;

    sqlx::query("DELETE FROM favorites WHERE id=?")
        .bind(favorite.id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}
