//! Database operations for `search_queries`.
//!
//! Status transitions are guarded in SQL (`WHERE status = ...`) so a query can
//! only move forward through `PENDING -> PROCESSING -> COMPLETED | FAILED`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const SEARCH_QUERY_COLUMNS: &str = "id, public_id, user_id, keyword, platform, target_url, \
                                    max_results, status, external_run_id, result_count, \
                                    error_message, created_at, started_at, completed_at";

/// A row from the `search_queries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchQueryRow {
    pub id: i64,
    pub public_id: Uuid,
    pub user_id: i64,
    pub keyword: String,
    pub platform: String,
    /// URL handed to the content source, resolved from `keyword`.
    pub target_url: String,
    pub max_results: i32,
    pub status: String,
    /// Run identifier reported by the content source.
    pub external_run_id: Option<String>,
    /// Set exactly once, on completion.
    pub result_count: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for [`create_search_query`].
#[derive(Debug, Clone, Copy)]
pub struct NewSearchQuery<'a> {
    pub user_id: i64,
    pub keyword: &'a str,
    pub platform: &'a str,
    pub target_url: &'a str,
    pub max_results: i32,
}

/// Creates a search query in `PENDING` status and returns the full row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_search_query(
    pool: &PgPool,
    query: NewSearchQuery<'_>,
) -> Result<SearchQueryRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, SearchQueryRow>(&format!(
        "INSERT INTO search_queries \
             (public_id, user_id, keyword, platform, target_url, max_results, status) \
         VALUES ($1, $2, $3, $4, $5, $6, 'PENDING') \
         RETURNING {SEARCH_QUERY_COLUMNS}"
    ))
    .bind(public_id)
    .bind(query.user_id)
    .bind(query.keyword)
    .bind(query.platform)
    .bind(query.target_url)
    .bind(query.max_results)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Moves a query from `PENDING` to `PROCESSING` and stamps `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidSearchTransition`] if the query is not pending,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn start_search_query(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_queries \
         SET status = 'PROCESSING', started_at = NOW() \
         WHERE id = $1 AND status = 'PENDING'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSearchTransition {
            id,
            expected_status: "PENDING",
        });
    }

    Ok(())
}

/// Moves a query from `PROCESSING` to `COMPLETED`, recording the result count
/// and the content source's run identifier.
///
/// # Errors
///
/// Returns [`DbError::InvalidSearchTransition`] if the query is not
/// processing, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_search_query(
    pool: &PgPool,
    id: i64,
    result_count: i32,
    external_run_id: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_queries \
         SET status = 'COMPLETED', completed_at = NOW(), result_count = $1, \
             external_run_id = $2 \
         WHERE id = $3 AND status = 'PROCESSING'",
    )
    .bind(result_count)
    .bind(external_run_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSearchTransition {
            id,
            expected_status: "PROCESSING",
        });
    }

    Ok(())
}

/// Moves an open query (`PENDING` or `PROCESSING`) to `FAILED`, keeping the
/// raw error message for diagnostics.
///
/// # Errors
///
/// Returns [`DbError::InvalidSearchTransition`] if the query is already
/// terminal, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_search_query(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE search_queries \
         SET status = 'FAILED', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status IN ('PENDING', 'PROCESSING')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSearchTransition {
            id,
            expected_status: "PENDING or PROCESSING",
        });
    }

    Ok(())
}

/// Fails every open query created before `created_before`.
///
/// Returns the number of queries that were failed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn fail_stale_search_queries(
    pool: &PgPool,
    created_before: DateTime<Utc>,
    error_message: &str,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE search_queries \
         SET status = 'FAILED', completed_at = NOW(), error_message = $1 \
         WHERE status IN ('PENDING', 'PROCESSING') AND created_at < $2",
    )
    .bind(error_message)
    .bind(created_before)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fetches a query by internal id, without an ownership check.
///
/// Only for internal callers (the background worker); request handlers must
/// use [`get_search_query_for_user`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_search_query(pool: &PgPool, id: i64) -> Result<Option<SearchQueryRow>, DbError> {
    let row = sqlx::query_as::<_, SearchQueryRow>(&format!(
        "SELECT {SEARCH_QUERY_COLUMNS} FROM search_queries WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches a query by public id, only if `user_id` owns it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_search_query_for_user(
    pool: &PgPool,
    user_id: i64,
    public_id: Uuid,
) -> Result<Option<SearchQueryRow>, DbError> {
    let row = sqlx::query_as::<_, SearchQueryRow>(&format!(
        "SELECT {SEARCH_QUERY_COLUMNS} FROM search_queries \
         WHERE public_id = $1 AND user_id = $2"
    ))
    .bind(public_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the user's most recent `limit` queries, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_search_queries_for_user(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<SearchQueryRow>, DbError> {
    let rows = sqlx::query_as::<_, SearchQueryRow>(&format!(
        "SELECT {SEARCH_QUERY_COLUMNS} FROM search_queries \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
