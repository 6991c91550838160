use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use crate::{auth::Identity, models::University, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update).delete(delete))
}

#[debug_handler]
async fn list(State(db_pool): State<SqlitePool>) -> AppResult<Json<Vec<University>>> {
    let universities: Vec<University> =
        sqlx::query_as("SELECT * FROM universities ORDER BY name, id")
            .fetch_all(&db_pool)
            .await?;
    Ok(Json(universities))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<University>> {
    let university: University = sqlx::query_as("SELECT * FROM universities WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(university))
}

#[derive(Debug, Deserialize)]
struct UniversityCreate {
    name: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    website: String,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    _ident: Identity,
    Json(body): Json<UniversityCreate>,
) -> AppResult<(StatusCode, Json<University>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::validation("name", "may not be blank"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO universities (name,location,description,website,created_at,updated_at) \
         VALUES (?,?,?,?,?,?)",
    )
    .bind(body.name.trim())
    .bind(&body.location)
    .bind(&body.description)
    .bind(&body.website)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let university: University = sqlx::query_as("SELECT * FROM universities WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(university)))
}

#[derive(Debug, Deserialize)]
struct UniversityUpdate {
    name: Option<String>,
    location: Option<String>,
    description: Option<String>,
    website: Option<String>,
}

// reference data: any authenticated caller maintains it
#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    _ident: Identity,
    Json(body): Json<UniversityUpdate>,
) -> AppResult<Json<University>> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("name", "may not be blank"));
        }
    }

    let found = sqlx::query(
        "UPDATE universities SET name=COALESCE(?,name), location=COALESCE(?,location), \
         description=COALESCE(?,description), website=COALESCE(?,website), updated_at=? \
         WHERE id=?",
    )
    .bind(body.name)
    .bind(body.location)
    .bind(body.description)
    .bind(body.website)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(&db_pool)
    .await?
    .rows_affected();
    if found == 0 {
        return Err(AppError::NotFound);
    }

    let university: University = sqlx::query_as("SELECT * FROM universities WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(university))
}

#[debug_handler]
async fn delete(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    _ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let found = sqlx::query("DELETE FROM universities WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?
        .rows_affected();
    if found == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({"ok": true})))
}
