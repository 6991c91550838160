use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::Date;

use crate::{auth::Identity, error::is_unique_violation, models::Profile, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/", get(me).post(create))
        .route("/{id}", get(get_one).patch(update))
}

#[debug_handler]
async fn me(State(db_pool): State<SqlitePool>, ident: Identity) -> AppResult<Json<Profile>> {
    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE user_id=?")
        .bind(ident.user_id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    bio: String,
    #[serde(default)]
    location: String,
    birth_date: Option<Date>,
    #[serde(default)]
    phone_number: String,
}

// Registration already creates an empty profile; this only serves callers
// whose profile row was deleted out of band. Role flags are not accepted
// here or anywhere else in a request payload.
#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<ProfileBody>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let inserted = sqlx::query(
        "INSERT INTO profiles (user_id,bio,location,birth_date,phone_number) VALUES (?,?,?,?,?)",
    )
    .bind(ident.user_id)
    .bind(&body.bio)
    .bind(&body.location)
    .bind(body.birth_date)
    .bind(&body.phone_number)
    .execute(&db_pool)
    .await;

    let id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::validation("user", "profile already exists"));
        }
        Err(err) => return Err(err.into()),
    };

    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Profile>> {
    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;

    // profiles are visible to their owner only
    if profile.user_id != ident.user_id {
        return Err(AppError::NotFound);
    }
    Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
struct ProfileUpdate {
    bio: Option<String>,
    location: Option<String>,
    birth_date: Option<Date>,
    phone_number: Option<String>,
}

#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<ProfileUpdate>,
) -> AppResult<Json<Profile>> {
    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;

    if profile.user_id != ident.user_id {
        return Err(AppError::Forbidden);
    }

    sqlx::query(
        "UPDATE profiles SET bio=COALESCE(?,bio), location=COALESCE(?,location), \
         birth_date=COALESCE(?,birth_date), phone_number=COALESCE(?,phone_number) WHERE id=?",
    )
    .bind(body.bio)
    .bind(body.location)
    .bind(body.birth_date)
    .bind(body.phone_number)
    .bind(id)
    .execute(&db_pool)
    .await?;

    let profile: Profile = sqlx::query_as("SELECT * FROM profiles WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(profile))
}
