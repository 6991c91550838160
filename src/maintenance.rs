use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{
    auth::Identity,
    models::{MaintenanceRequest, MaintenanceStatus},
    policy, AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update))
}

#[debug_handler]
async fn list(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Vec<MaintenanceRequest>>> {
    let requests: Vec<MaintenanceRequest> = match policy::owner_filter(&ident) {
        Some(user_id) => {
            sqlx::query_as(
                "SELECT * FROM maintenance_requests WHERE user_id=? \
                 ORDER BY created_at DESC, id DESC",
            )
            .bind(user_id)
            .fetch_all(&db_pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM maintenance_requests ORDER BY created_at DESC, id DESC")
                .fetch_all(&db_pool)
                .await?
        }
    };
    Ok(Json(requests))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<MaintenanceRequest>> {
    let request: MaintenanceRequest =
        sqlx::query_as("SELECT * FROM maintenance_requests WHERE id=?")
            .bind(id)
            .fetch_optional(&db_pool)
            .await?
            .ok_or(AppError::NotFound)?;
    let request = policy::visible_to(&ident, request.user_id, request)?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
struct MaintenanceCreate {
    hostel_id: i64,
    title: String,
    #[serde(default)]
    description: String,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<MaintenanceCreate>,
) -> AppResult<(StatusCode, Json<MaintenanceRequest>)> {
    if body.title.trim().is_empty() {
        return Err(AppError::validation("title", "may not be blank"));
    }
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM hostels WHERE id=?")
        .bind(body.hostel_id)
        .fetch_optional(&db_pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::validation("hostel_id", "unknown hostel"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO maintenance_requests \
         (user_id,hostel_id,title,description,status,created_at,updated_at) \
         VALUES (?,?,?,?,?,?,?)",
    )
    .bind(ident.user_id)
    .bind(body.hostel_id)
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(MaintenanceStatus::Pending)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let request: MaintenanceRequest =
        sqlx::query_as("SELECT * FROM maintenance_requests WHERE id=?")
            .bind(id)
            .fetch_one(&db_pool)
            .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[derive(Debug, Deserialize)]
struct MaintenanceUpdate {
    status: MaintenanceStatus,
}

#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<MaintenanceUpdate>,
) -> AppResult<Json<MaintenanceRequest>> {
    let request: MaintenanceRequest =
        sqlx::query_as("SELECT * FROM maintenance_requests WHERE id=?")
            .bind(id)
            .fetch_optional(&db_pool)
            .await?
            .ok_or(AppError::NotFound)?;
    let request = policy::visible_to(&ident, request.user_id, request)?;

    // the reporter may withdraw their own request; staff drive the rest
    if !ident.is_staff() && body.status != MaintenanceStatus::Cancelled {
        return Err(AppError::Forbidden);
    }
    if request.status.is_terminal() {
        return Err(AppError::validation("status", "request is already closed"));
    }

    sqlx::query("UPDATE maintenance_requests SET status=?, updated_at=? WHERE id=?")
        .bind(body.status)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .execute(&db_pool)
        .await?;

    let request: MaintenanceRequest =
        sqlx::query_as("SELECT * FROM maintenance_requests WHERE id=?")
            .bind(id)
            .fetch_one(&db_pool)
            .await?;
    Ok(Json(request))
}
