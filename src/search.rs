use axum::{
    debug_handler,
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{hostels, models::Hostel, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    q: Option<String>,
}

/// Free-text hostel search: case-insensitive substring match on name, city
/// or description (union of the three).
#[debug_handler]
pub(crate) async fn search(
    Query(SearchQuery { q }): Query<SearchQuery>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Hostel>>> {
    let Some(q) = q.filter(|q| !q.trim().is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    let sql = format!(
        "{} WHERE instr(lower(h.name), lower(?)) > 0 \
         OR instr(lower(h.city), lower(?)) > 0 \
         OR instr(lower(h.description), lower(?)) > 0 \
         ORDER BY h.id",
        hostels::SELECT
    );
    let hostels: Vec<Hostel> = sqlx::query_as(&sql)
        .bind(q.trim())
        .bind(q.trim())
        .bind(q.trim())
        .fetch_all(&db_pool)
        .await?;
    Ok(Json(hostels))
}
