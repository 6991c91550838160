use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{auth::Identity, models::Review, policy, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update).delete(delete))
}

/// Shared with `POST /hostels/{id}/add_review`. The author is always the
/// caller; the rating must land in 1..=5.
pub(crate) async fn insert_review(
    db_pool: &SqlitePool,
    user_id: i64,
    hostel_id: i64,
    rating: i64,
    comment: &str,
) -> AppResult<Review> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("rating", "must be between 1 and 5"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO reviews (user_id,hostel_id,rating,comment,created_at,updated_at) \
         VALUES (?,?,?,?,?,?)",
    )
    .bind(user_id)
    .bind(hostel_id)
    .bind(rating)
    .bind(comment)
    .bind(now)
    .bind(now)
    .execute(db_pool)
    .await?
    .last_insert_rowid();

    let review: Review = sqlx::query_as("SELECT * FROM reviews WHERE id=?")
        .bind(id)
        .fetch_one(db_pool)
        .await?;
    Ok(review)
}

#[derive(Debug, Deserialize)]
struct ReviewFilter {
    hostel_id: Option<i64>,
}

#[debug_handler]
async fn list(
    Query(ReviewFilter { hostel_id }): Query<ReviewFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews: Vec<Review> = match hostel_id {
        Some(hostel_id) => {
            sqlx::query_as(
                "SELECT * FROM reviews WHERE hostel_id=? ORDER BY created_at DESC, id DESC",
            )
            .bind(hostel_id)
            .fetch_all(&db_pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM reviews ORDER BY created_at DESC, id DESC")
                .fetch_all(&db_pool)
                .await?
        }
    };
    Ok(Json(reviews))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Review>> {
    let review: Review = sqlx::query_as("SELECT * FROM reviews WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(review))
}

#[derive(Debug, Deserialize)]
struct ReviewCreate {
    hostel_id: i64,
    rating: i64,
    #[serde(default)]
    comment: String,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<ReviewCreate>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM hostels WHERE id=?")
        .bind(body.hostel_id)
        .fetch_optional(&db_pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::validation("hostel_id", "unknown hostel"));
    }

    let review =
        insert_review(&db_pool, ident.user_id, body.hostel_id, body.rating, &body.comment).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[derive(Debug, Deserialize)]
struct ReviewUpdate {
    rating: Option<i64>,
    comment: Option<String>,
}

#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<ReviewUpdate>,
) -> AppResult<Json<Review>> {
    let review: Review = sqlx::query_as("SELECT * FROM reviews WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, review.user_id)?;

    if let Some(rating) = body.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::validation("rating", "must be between 1 and 5"));
        }
    }

    sqlx::query(
        "UPDATE reviews SET rating=COALESCE(?,rating), comment=COALESCE(?,comment), \
         updated_at=? WHERE id=?",
    )
    .bind(body.rating)
    .bind(body.comment)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(&db_pool)
    .await?;

    let review: Review = sqlx::query_as("SELECT * FROM reviews WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(review))
}

#[debug_handler]
async fn delete(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let review: Review = sqlx::query_as("SELECT * FROM reviews WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, review.user_id)?;

    sqlx::query("DELETE FROM reviews WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}
