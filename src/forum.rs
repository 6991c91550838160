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

use crate::{
    auth::Identity,
    models::{ForumPost, ForumTopic},
    policy, AppError, AppResult, AppState,
};

pub fn topics_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_topics).post(create_topic))
        .route("/{id}", get(get_topic).patch(update_topic).delete(delete_topic))
}

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).patch(update_post).delete(delete_post))
}

#[debug_handler]
async fn list_topics(State(db_pool): State<SqlitePool>) -> AppResult<Json<Vec<ForumTopic>>> {
    let topics: Vec<ForumTopic> =
        sqlx::query_as("SELECT * FROM forum_topics ORDER BY created_at DESC, id DESC")
            .fetch_all(&db_pool)
            .await?;
    Ok(Json(topics))
}

#[debug_handler]
async fn get_topic(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<ForumTopic>> {
    let topic: ForumTopic = sqlx::query_as("SELECT * FROM forum_topics WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
struct TopicCreate {
    title: String,
    #[serde(default)]
    description: String,
}

#[debug_handler]
async fn create_topic(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<TopicCreate>,
) -> AppResult<(StatusCode, Json<ForumTopic>)> {
    if body.title.trim().is_empty() {
        return Err(AppError::validation("title", "may not be blank"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO forum_topics (title,description,created_by,created_at,updated_at) \
         VALUES (?,?,?,?,?)",
    )
    .bind(body.title.trim())
    .bind(&body.description)
    .bind(ident.user_id)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let topic: ForumTopic = sqlx::query_as("SELECT * FROM forum_topics WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

#[derive(Debug, Deserialize)]
struct PostFilter {
    topic_id: Option<i64>,
}

#[debug_handler]
async fn list_posts(
    Query(PostFilter { topic_id }): Query<PostFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<ForumPost>>> {
    let posts: Vec<ForumPost> = match topic_id {
        Some(topic_id) => {
            sqlx::query_as("SELECT * FROM forum_posts WHERE topic_id=? ORDER BY created_at, id")
                .bind(topic_id)
                .fetch_all(&db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM forum_posts ORDER BY created_at, id")
                .fetch_all(&db_pool)
                .await?
        }
    };
    Ok(Json(posts))
}

#[derive(Debug, Deserialize)]
struct PostCreate {
    topic_id: i64,
    content: String,
}

#[debug_handler]
async fn create_post(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<PostCreate>,
) -> AppResult<(StatusCode, Json<ForumPost>)> {
    if body.content.trim().is_empty() {
        return Err(AppError::validation("content", "may not be blank"));
    }
    let topic: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM forum_topics WHERE id=?")
        .bind(body.topic_id)
        .fetch_optional(&db_pool)
        .await?;
    match topic {
        None => return Err(AppError::validation("topic_id", "unknown topic")),
        Some((false,)) => return Err(AppError::validation("topic_id", "topic is closed")),
        Some((true,)) => {}
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO forum_posts (topic_id,author_id,content,created_at,updated_at) \
         VALUES (?,?,?,?,?)",
    )
    .bind(body.topic_id)
    .bind(ident.user_id)
    .bind(&body.content)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let post: ForumPost = sqlx::query_as("SELECT * FROM forum_posts WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Deserialize)]
struct TopicUpdate {
    title: Option<String>,
    description: Option<String>,
    is_active: Option<bool>,
}

#[debug_handler]
async fn update_topic(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<TopicUpdate>,
) -> AppResult<Json<ForumTopic>> {
    let topic: ForumTopic = sqlx::query_as("SELECT * FROM forum_topics WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, topic.created_by)?;

    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(AppError::validation("title", "may not be blank"));
        }
    }

    sqlx::query(
        "UPDATE forum_topics SET title=COALESCE(?,title), description=COALESCE(?,description), \
         is_active=COALESCE(?,is_active), updated_at=? WHERE id=?",
    )
    .bind(body.title)
    .bind(body.description)
    .bind(body.is_active)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(&db_pool)
    .await?;

    let topic: ForumTopic = sqlx::query_as("SELECT * FROM forum_topics WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(topic))
}

#[debug_handler]
async fn delete_topic(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let topic: ForumTopic = sqlx::query_as("SELECT * FROM forum_topics WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, topic.created_by)?;

    // posts go with the topic
    sqlx::query("DELETE FROM forum_topics WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}

#[debug_handler]
async fn get_post(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<ForumPost>> {
    let post: ForumPost = sqlx::query_as("SELECT * FROM forum_posts WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

#[derive(Debug, Deserialize)]
struct PostUpdate {
    content: Option<String>,
}

#[debug_handler]
async fn update_post(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<PostUpdate>,
) -> AppResult<Json<ForumPost>> {
    let post: ForumPost = sqlx::query_as("SELECT * FROM forum_posts WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, post.author_id)?;

    if let Some(content) = &body.content {
        if content.trim().is_empty() {
            return Err(AppError::validation("content", "may not be blank"));
        }
    }

    sqlx::query("UPDATE forum_posts SET content=COALESCE(?,content), updated_at=? WHERE id=?")
        .bind(body.content)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .execute(&db_pool)
        .await?;

    let post: ForumPost = sqlx::query_as("SELECT * FROM forum_posts WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(post))
}

#[debug_handler]
async fn delete_post(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let post: ForumPost = sqlx::query_as("SELECT * FROM forum_posts WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, post.author_id)?;

    sqlx::query("DELETE FROM forum_posts WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}
