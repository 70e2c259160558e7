//! Read-model queries behind the per-user dashboard.
//!
//! Every query joins through `search_queries.user_id`; contents are never
//! read without their owning user in the predicate.

use sqlx::PgPool;

use crate::contents::{ContentRow, CONTENT_COLUMNS};
use crate::DbError;

/// Search count for one platform.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformCountRow {
    pub platform: String,
    pub search_count: i64,
}

/// Counts every search query the user has submitted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_search_queries_for_user(pool: &PgPool, user_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM search_queries WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Counts content rows across all of the user's queries.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_contents_for_user(pool: &PgPool, user_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM contents c \
         JOIN search_queries q ON q.id = c.search_query_id \
         WHERE q.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Returns the user's `limit` highest-scoring content rows across all queries.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_contents_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<ContentRow>, DbError> {
    let columns = CONTENT_COLUMNS
        .split(',')
        .map(|c| format!("c.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");

    let rows = sqlx::query_as::<_, ContentRow>(&format!(
        "SELECT {columns} FROM contents c \
         JOIN search_queries q ON q.id = c.search_query_id \
         WHERE q.user_id = $1 \
         ORDER BY c.engagement_score DESC, c.id ASC \
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the number of searches per platform, most-used first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_platform_distribution_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<PlatformCountRow>, DbError> {
    let rows = sqlx::query_as::<_, PlatformCountRow>(
        "SELECT platform, COUNT(*) AS search_count \
         FROM search_queries \
         WHERE user_id = $1 \
         GROUP BY platform \
         ORDER BY search_count DESC, platform ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
