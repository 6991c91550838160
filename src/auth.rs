use axum::{
    debug_handler,
    extract::{FromRef, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use tracing::info;

use crate::{
    error::is_unique_violation, models::User, session::USER_ID, AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/logout", post(logout))
}

/// The authenticated caller, resolved once at request entry: identity from
/// the session (or an upstream-resolved bearer token carrying the user id),
/// role flags from the caller's own profile. Never taken from the payload.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: i64,
    pub is_manager: bool,
    pub is_admin: bool,
}

impl Identity {
    pub fn is_staff(&self) -> bool {
        self.is_manager || self.is_admin
    }
}

fn bearer_user(parts: &Parts) -> Option<i64> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim()
        .parse()
        .ok()
}

impl<S> FromRequestParts<S> for Identity
where
    SqlitePool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_id = match bearer_user(parts) {
            Some(id) => id,
            None => {
                let session = Session::from_request_parts(parts, state)
                    .await
                    .map_err(|(_, msg)| AppError::Internal(anyhow::Error::msg(msg)))?;
                session
                    .get::<i64>(USER_ID)
                    .await?
                    .ok_or(AppError::Unauthenticated)?
            }
        };

        let db_pool = SqlitePool::from_ref(state);
        let flags: Option<(bool, bool)> =
            sqlx::query_as("SELECT is_manager,is_admin FROM profiles WHERE user_id=?")
                .bind(user_id)
                .fetch_optional(&db_pool)
                .await?;
        let (is_manager, is_admin) = flags.ok_or(AppError::Unauthenticated)?;

        Ok(Identity { user_id, is_manager, is_admin })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterBody {
    username: String,
    email: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

/// Creates the User and its empty Profile in one transaction so a failed
/// profile insert cannot leave a user without one.
#[debug_handler]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(body): Json<RegisterBody>,
) -> AppResult<(StatusCode, Json<User>)> {
    if body.username.trim().is_empty() {
        return Err(AppError::validation("username", "may not be blank"));
    }
    if !body.email.contains('@') {
        return Err(AppError::validation("email", "enter a valid email address"));
    }

    let mut tx = db_pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO users (username,email,first_name,last_name,date_joined) VALUES (?,?,?,?,?)",
    )
    .bind(body.username.trim())
    .bind(&body.email)
    .bind(&body.first_name)
    .bind(&body.last_name)
    .bind(OffsetDateTime::now_utc())
    .execute(&mut *tx)
    .await;

    let user_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(err) if is_unique_violation(&err) => {
            return Err(AppError::validation("username", "already taken"));
        }
        Err(err) => return Err(err.into()),
    };

    sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    session.insert(USER_ID, user_id).await?;
    info!(user_id, username = %body.username.trim(), "registered");

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id=?")
        .bind(user_id)
        .fetch_one(&db_pool)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<Json<serde_json::Value>> {
    session.clear().await;
    Ok(Json(json!({"ok": true})))
}
