use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{types::Json as SqlJson, SqlitePool};

use crate::{
    auth::Identity,
    models::{Room, RoomType},
    policy, AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update).delete(delete))
}

async fn fetch(db_pool: &SqlitePool, id: i64) -> AppResult<Room> {
    sqlx::query_as("SELECT * FROM rooms WHERE id=?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound)
}

async fn hostel_manager(db_pool: &SqlitePool, hostel_id: i64) -> AppResult<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT manager_id FROM hostels WHERE id=?")
        .bind(hostel_id)
        .fetch_optional(db_pool)
        .await?;
    row.map(|(id,)| id)
        .ok_or_else(|| AppError::validation("hostel_id", "unknown hostel"))
}

#[derive(Debug, Deserialize)]
struct RoomFilter {
    hostel_id: Option<i64>,
}

#[debug_handler]
async fn list(
    Query(RoomFilter { hostel_id }): Query<RoomFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Room>>> {
    let rooms: Vec<Room> = match hostel_id {
        Some(hostel_id) => {
            sqlx::query_as("SELECT * FROM rooms WHERE hostel_id=? ORDER BY id")
                .bind(hostel_id)
                .fetch_all(&db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM rooms ORDER BY id")
                .fetch_all(&db_pool)
                .await?
        }
    };
    Ok(Json(rooms))
}

#[debug_handler]
async fn get_one(Path(id): Path<i64>, State(db_pool): State<SqlitePool>) -> AppResult<Json<Room>> {
    Ok(Json(fetch(&db_pool, id).await?))
}

#[derive(Debug, Deserialize)]
struct RoomCreate {
    hostel_id: i64,
    #[serde(default)]
    room_number: String,
    room_type: RoomType,
    capacity: i64,
    price_per_night: f64,
    #[serde(default = "default_true")]
    is_available: bool,
    #[serde(default)]
    amenities: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<RoomCreate>,
) -> AppResult<(StatusCode, Json<Room>)> {
    let manager_id = hostel_manager(&db_pool, body.hostel_id).await?;
    policy::require_manager_or_admin(&ident, manager_id)?;

    if body.capacity < 1 {
        return Err(AppError::validation("capacity", "must be at least 1"));
    }
    if body.price_per_night < 0.0 {
        return Err(AppError::validation("price_per_night", "may not be negative"));
    }

    let id = sqlx::query(
        "INSERT INTO rooms \
         (hostel_id,room_number,room_type,capacity,price_per_night,is_available,amenities,images) \
         VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(body.hostel_id)
    .bind(&body.room_number)
    .bind(body.room_type)
    .bind(body.capacity)
    .bind(body.price_per_night)
    .bind(body.is_available)
    .bind(SqlJson(body.amenities))
    .bind(SqlJson(body.images))
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch(&db_pool, id).await?)))
}

#[derive(Debug, Deserialize)]
struct RoomUpdate {
    room_number: Option<String>,
    room_type: Option<RoomType>,
    capacity: Option<i64>,
    price_per_night: Option<f64>,
    is_available: Option<bool>,
    amenities: Option<Vec<String>>,
    images: Option<Vec<String>>,
}

#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<RoomUpdate>,
) -> AppResult<Json<Room>> {
    let room = fetch(&db_pool, id).await?;
    let manager_id = hostel_manager(&db_pool, room.hostel_id).await?;
    policy::require_manager_or_admin(&ident, manager_id)?;

    if let Some(capacity) = body.capacity {
        if capacity < 1 {
            return Err(AppError::validation("capacity", "must be at least 1"));
        }
    }
    if let Some(price) = body.price_per_night {
        if price < 0.0 {
            return Err(AppError::validation("price_per_night", "may not be negative"));
        }
    }

    sqlx::query(
        "UPDATE rooms SET room_number=COALESCE(?,room_number), room_type=COALESCE(?,room_type), \
         capacity=COALESCE(?,capacity), price_per_night=COALESCE(?,price_per_night), \
         is_available=COALESCE(?,is_available), amenities=COALESCE(?,amenities), \
         images=COALESCE(?,images) WHERE id=?",
    )
    .bind(body.room_number)
    .bind(body.room_type)
    .bind(body.capacity)
    .bind(body.price_per_night)
    .bind(body.is_available)
    .bind(body.amenities.map(SqlJson))
    .bind(body.images.map(SqlJson))
    .bind(id)
    .execute(&db_pool)
    .await?;

    Ok(Json(fetch(&db_pool, id).await?))
}

#[debug_handler]
async fn delete(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let room = fetch(&db_pool, id).await?;
    let manager_id = hostel_manager(&db_pool, room.hostel_id).await?;
    policy::require_manager_or_admin(&ident, manager_id)?;

    sqlx::query("DELETE FROM rooms WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}
