use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{types::Json as SqlJson, SqlitePool};
use time::OffsetDateTime;

use crate::{
    auth::Identity,
    models::{Hostel, Review},
    policy, reviews, AppError, AppResult, AppState,
};

/// Base select carrying the computed review average; every hostel read goes
/// through this so `average_rating` is always present.
pub(crate) const SELECT: &str = "SELECT h.*, \
    COALESCE((SELECT AVG(r.rating) FROM reviews r WHERE r.hostel_id = h.id), 0.0) AS average_rating \
    FROM hostels h";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update).delete(delete))
        .route("/{id}/add_review", post(add_review))
}

pub(crate) async fn fetch(db_pool: &SqlitePool, id: i64) -> AppResult<Hostel> {
    let sql = format!("{SELECT} WHERE h.id=?");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound)
}

#[derive(Debug, Deserialize)]
struct HostelFilter {
    city: Option<String>,
}

#[debug_handler]
async fn list(
    Query(HostelFilter { city }): Query<HostelFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Hostel>>> {
    let hostels: Vec<Hostel> = match city {
        Some(city) => {
            let sql = format!("{SELECT} WHERE instr(lower(h.city), lower(?)) > 0 ORDER BY h.id");
            sqlx::query_as(&sql).bind(city).fetch_all(&db_pool).await?
        }
        None => {
            let sql = format!("{SELECT} ORDER BY h.id");
            sqlx::query_as(&sql).fetch_all(&db_pool).await?
        }
    };
    Ok(Json(hostels))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Hostel>> {
    Ok(Json(fetch(&db_pool, id).await?))
}

#[derive(Debug, Deserialize)]
struct HostelCreate {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    zip_code: String,
    price_per_night: f64,
    #[serde(default)]
    amenities: Vec<String>,
    #[serde(default)]
    rules: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<HostelCreate>,
) -> AppResult<(StatusCode, Json<Hostel>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::validation("name", "may not be blank"));
    }
    if body.price_per_night < 0.0 {
        return Err(AppError::validation("price_per_night", "may not be negative"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO hostels \
         (name,description,address,city,state,country,zip_code,price_per_night,\
          manager_id,amenities,rules,images,created_at,updated_at) \
         VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(&body.address)
    .bind(&body.city)
    .bind(&body.state)
    .bind(&body.country)
    .bind(&body.zip_code)
    .bind(body.price_per_night)
    .bind(ident.user_id)
    .bind(SqlJson(body.amenities))
    .bind(SqlJson(body.rules))
    .bind(SqlJson(body.images))
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch(&db_pool, id).await?)))
}

#[derive(Debug, Deserialize)]
struct HostelUpdate {
    name: Option<String>,
    description: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    zip_code: Option<String>,
    price_per_night: Option<f64>,
    is_active: Option<bool>,
    amenities: Option<Vec<String>>,
    rules: Option<Vec<String>>,
    images: Option<Vec<String>>,
}

#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<HostelUpdate>,
) -> AppResult<Json<Hostel>> {
    let hostel = fetch(&db_pool, id).await?;
    policy::require_manager_or_admin(&ident, hostel.manager_id)?;

    if let Some(price) = body.price_per_night {
        if price < 0.0 {
            return Err(AppError::validation("price_per_night", "may not be negative"));
        }
    }

    sqlx::query(
        "UPDATE hostels SET name=COALESCE(?,name), description=COALESCE(?,description), \
         address=COALESCE(?,address), city=COALESCE(?,city), state=COALESCE(?,state), \
         country=COALESCE(?,country), zip_code=COALESCE(?,zip_code), \
         price_per_night=COALESCE(?,price_per_night), is_active=COALESCE(?,is_active), \
         amenities=COALESCE(?,amenities), rules=COALESCE(?,rules), \
         images=COALESCE(?,images), updated_at=? WHERE id=?",
    )
    .bind(body.name)
    .bind(body.description)
    .bind(body.address)
    .bind(body.city)
    .bind(body.state)
    .bind(body.country)
    .bind(body.zip_code)
    .bind(body.price_per_night)
    .bind(body.is_active)
    .bind(body.amenities.map(SqlJson))
    .bind(body.rules.map(SqlJson))
    .bind(body.images.map(SqlJson))
    .bind(OffsetDateTime::now_utc())
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
    let hostel = fetch(&db_pool, id).await?;
    policy::require_manager_or_admin(&ident, hostel.manager_id)?;

    // rooms, bookings, reviews and maintenance requests go with it
    sqlx::query("DELETE FROM hostels WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
struct AddReviewBody {
    rating: i64,
    #[serde(default)]
    comment: String,
}

#[debug_handler]
async fn add_review(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<AddReviewBody>,
) -> AppResult<(StatusCode, Json<Review>)> {
    // unknown hostel in the URL is a 404, not a field error
    fetch(&db_pool, id).await?;
    let review =
        reviews::insert_review(&db_pool, ident.user_id, id, body.rating, &body.comment).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
