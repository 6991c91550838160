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
    models::{CommunityCategory, CommunityComment, CommunityPost},
    policy, AppError, AppResult, AppState,
};

pub fn categories_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/{id}", get(get_category).patch(update_category).delete(delete_category))
}

pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).patch(update_post).delete(delete_post))
}

pub fn comments_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route("/{id}", get(get_comment).patch(update_comment).delete(delete_comment))
}

#[debug_handler]
async fn list_categories(
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<CommunityCategory>>> {
    let categories: Vec<CommunityCategory> =
        sqlx::query_as("SELECT * FROM community_categories ORDER BY name, id")
            .fetch_all(&db_pool)
            .await?;
    Ok(Json(categories))
}

#[debug_handler]
async fn get_category(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<CommunityCategory>> {
    let category: CommunityCategory =
        sqlx::query_as("SELECT * FROM community_categories WHERE id=?")
            .bind(id)
            .fetch_optional(&db_pool)
            .await?
            .ok_or(AppError::NotFound)?;
    Ok(Json(category))
}

#[derive(Debug, Deserialize)]
struct CategoryCreate {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[debug_handler]
async fn create_category(
    State(db_pool): State<SqlitePool>,
    _ident: Identity,
    Json(body): Json<CategoryCreate>,
) -> AppResult<(StatusCode, Json<CommunityCategory>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::validation("name", "may not be blank"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO community_categories (name,description,icon,created_at,updated_at) \
         VALUES (?,?,?,?,?)",
    )
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(&body.icon)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let category: CommunityCategory =
        sqlx::query_as("SELECT * FROM community_categories WHERE id=?")
            .bind(id)
            .fetch_one(&db_pool)
            .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[derive(Debug, Deserialize)]
struct CategoryUpdate {
    name: Option<String>,
    description: Option<String>,
    icon: Option<String>,
}

// reference data: any authenticated caller maintains it
#[debug_handler]
async fn update_category(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    _ident: Identity,
    Json(body): Json<CategoryUpdate>,
) -> AppResult<Json<CommunityCategory>> {
    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("name", "may not be blank"));
        }
    }

    let found = sqlx::query(
        "UPDATE community_categories SET name=COALESCE(?,name), \
         description=COALESCE(?,description), icon=COALESCE(?,icon), updated_at=? WHERE id=?",
    )
    .bind(body.name)
    .bind(body.description)
    .bind(body.icon)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(&db_pool)
    .await?
    .rows_affected();
    if found == 0 {
        return Err(AppError::NotFound);
    }

    let category: CommunityCategory =
        sqlx::query_as("SELECT * FROM community_categories WHERE id=?")
            .bind(id)
            .fetch_one(&db_pool)
            .await?;
    Ok(Json(category))
}

#[debug_handler]
async fn delete_category(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    _ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let found = sqlx::query("DELETE FROM community_categories WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?
        .rows_affected();
    if found == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
struct PostFilter {
    category_id: Option<i64>,
}

// pinned posts first, then newest
#[debug_handler]
async fn list_posts(
    Query(PostFilter { category_id }): Query<PostFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<CommunityPost>>> {
    let posts: Vec<CommunityPost> = match category_id {
        Some(category_id) => {
            sqlx::query_as(
                "SELECT * FROM community_posts WHERE category_id=? \
                 ORDER BY is_pinned DESC, created_at DESC, id DESC",
            )
            .bind(category_id)
            .fetch_all(&db_pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM community_posts ORDER BY is_pinned DESC, created_at DESC, id DESC",
            )
            .fetch_all(&db_pool)
            .await?
        }
    };
    Ok(Json(posts))
}

#[debug_handler]
async fn get_post(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<CommunityPost>> {
    let post: CommunityPost = sqlx::query_as("SELECT * FROM community_posts WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

#[derive(Debug, Deserialize)]
struct PostCreate {
    category_id: i64,
    title: String,
    #[serde(default)]
    content: String,
}

#[debug_handler]
async fn create_post(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<PostCreate>,
) -> AppResult<(StatusCode, Json<CommunityPost>)> {
    if body.title.trim().is_empty() {
        return Err(AppError::validation("title", "may not be blank"));
    }
    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM community_categories WHERE id=?")
        .bind(body.category_id)
        .fetch_optional(&db_pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::validation("category_id", "unknown category"));
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO community_posts (category_id,author_id,title,content,created_at,updated_at) \
         VALUES (?,?,?,?,?,?)",
    )
    .bind(body.category_id)
    .bind(ident.user_id)
    .bind(body.title.trim())
    .bind(&body.content)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let post: CommunityPost = sqlx::query_as("SELECT * FROM community_posts WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Deserialize)]
struct PostUpdate {
    title: Option<String>,
    content: Option<String>,
    is_pinned: Option<bool>,
    is_closed: Option<bool>,
}

#[debug_handler]
async fn update_post(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<PostUpdate>,
) -> AppResult<Json<CommunityPost>> {
    let post: CommunityPost = sqlx::query_as("SELECT * FROM community_posts WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;

    // pinning and closing are moderation actions
    if (body.is_pinned.is_some() || body.is_closed.is_some()) && !ident.is_staff() {
        return Err(AppError::Forbidden);
    }
    if body.title.is_some() || body.content.is_some() {
        policy::require_owner_or_staff(&ident, post.author_id)?;
    }
    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(AppError::validation("title", "may not be blank"));
        }
    }

    sqlx::query(
        "UPDATE community_posts SET title=COALESCE(?,title), content=COALESCE(?,content), \
         is_pinned=COALESCE(?,is_pinned), is_closed=COALESCE(?,is_closed), updated_at=? \
         WHERE id=?",
    )
    .bind(body.title)
    .bind(body.content)
    .bind(body.is_pinned)
    .bind(body.is_closed)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(&db_pool)
    .await?;

    let post: CommunityPost = sqlx::query_as("SELECT * FROM community_posts WHERE id=?")
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
    let post: CommunityPost = sqlx::query_as("SELECT * FROM community_posts WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, post.author_id)?;

    // comments go with the post
    sqlx::query("DELETE FROM community_posts WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
struct CommentFilter {
    post_id: Option<i64>,
}

/// Without a `post_id` the list is empty on purpose: there is no use case
/// for dumping every comment across all posts.
#[debug_handler]
async fn list_comments(
    Query(CommentFilter { post_id }): Query<CommentFilter>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<CommunityComment>>> {
    let Some(post_id) = post_id else {
        return Ok(Json(Vec::new()));
    };

    let comments: Vec<CommunityComment> = sqlx::query_as(
        "SELECT * FROM community_comments WHERE post_id=? ORDER BY created_at, id",
    )
    .bind(post_id)
    .fetch_all(&db_pool)
    .await?;
    Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
struct CommentCreate {
    post_id: i64,
    content: String,
}

#[debug_handler]
async fn create_comment(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<CommentCreate>,
) -> AppResult<(StatusCode, Json<CommunityComment>)> {
    if body.content.trim().is_empty() {
        return Err(AppError::validation("content", "may not be blank"));
    }
    let post: Option<(bool,)> = sqlx::query_as("SELECT is_closed FROM community_posts WHERE id=?")
        .bind(body.post_id)
        .fetch_optional(&db_pool)
        .await?;
    match post {
        None => return Err(AppError::validation("post_id", "unknown post")),
        Some((true,)) => return Err(AppError::validation("post_id", "post is closed")),
        Some((false,)) => {}
    }

    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO community_comments (post_id,author_id,content,created_at,updated_at) \
         VALUES (?,?,?,?,?)",
    )
    .bind(body.post_id)
    .bind(ident.user_id)
    .bind(&body.content)
    .bind(now)
    .bind(now)
    .execute(&db_pool)
    .await?
    .last_insert_rowid();

    let comment: CommunityComment = sqlx::query_as("SELECT * FROM community_comments WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[debug_handler]
async fn get_comment(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<CommunityComment>> {
    let comment: CommunityComment = sqlx::query_as("SELECT * FROM community_comments WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(comment))
}

#[derive(Debug, Deserialize)]
struct CommentUpdate {
    content: Option<String>,
}

#[debug_handler]
async fn update_comment(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<CommentUpdate>,
) -> AppResult<Json<CommunityComment>> {
    let comment: CommunityComment = sqlx::query_as("SELECT * FROM community_comments WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, comment.author_id)?;

    if let Some(content) = &body.content {
        if content.trim().is_empty() {
            return Err(AppError::validation("content", "may not be blank"));
        }
    }

    sqlx::query(
        "UPDATE community_comments SET content=COALESCE(?,content), updated_at=? WHERE id=?",
    )
    .bind(body.content)
    .bind(OffsetDateTime::now_utc())
    .bind(id)
    .execute(&db_pool)
    .await?;

    let comment: CommunityComment = sqlx::query_as("SELECT * FROM community_comments WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(comment))
}

#[debug_handler]
async fn delete_comment(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<serde_json::Value>> {
    let comment: CommunityComment = sqlx::query_as("SELECT * FROM community_comments WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    policy::require_owner_or_staff(&ident, comment.author_id)?;

    sqlx::query("DELETE FROM community_comments WHERE id=?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(Json(json!({"ok": true})))
}
