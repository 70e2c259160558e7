//! Database operations for `contents`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trendscout_core::ContentDraft;

use crate::DbError;

pub(crate) const CONTENT_COLUMNS: &str = "id, search_query_id, external_id, platform, url, caption, \
                                          media_urls, page_name, page_url, posted_at, likes, \
                                          comments, shares, views, engagement_score, reactions, \
                                          created_at, updated_at";

/// A row from the `contents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentRow {
    pub id: i64,
    pub search_query_id: i64,
    pub external_id: String,
    pub platform: String,
    pub url: Option<String>,
    pub caption: Option<String>,
    pub media_urls: Vec<String>,
    pub page_name: Option<String>,
    pub page_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
    pub engagement_score: i64,
    pub reactions: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upserts one content row for a search query.
///
/// Conflicts on `(search_query_id, external_id)` overwrite only the mutable
/// counters (`likes`, `comments`, `shares`, `views`, `engagement_score`,
/// `reactions`) and `updated_at`; identity fields keep their first-seen values.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_content(
    pool: &PgPool,
    search_query_id: i64,
    draft: &ContentDraft,
) -> Result<ContentRow, DbError> {
    let row = sqlx::query_as::<_, ContentRow>(&format!(
        "INSERT INTO contents \
             (search_query_id, external_id, platform, url, caption, media_urls, \
              page_name, page_url, posted_at, likes, comments, shares, views, \
              engagement_score, reactions) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (search_query_id, external_id) DO UPDATE SET \
             likes            = EXCLUDED.likes, \
             comments         = EXCLUDED.comments, \
             shares           = EXCLUDED.shares, \
             views            = EXCLUDED.views, \
             engagement_score = EXCLUDED.engagement_score, \
             reactions        = EXCLUDED.reactions, \
             updated_at       = NOW() \
         RETURNING {CONTENT_COLUMNS}"
    ))
    .bind(search_query_id)
    .bind(&draft.external_id)
    .bind(draft.platform.as_str())
    .bind(&draft.url)
    .bind(&draft.caption)
    .bind(&draft.media_urls)
    .bind(&draft.page_name)
    .bind(&draft.page_url)
    .bind(draft.posted_at)
    .bind(draft.likes)
    .bind(draft.comments)
    .bind(draft.shares)
    .bind(draft.views)
    .bind(draft.engagement_score)
    .bind(&draft.reactions)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns every content row of a query, ranked by engagement score.
///
/// Ties are broken by insertion order (`id ASC`).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_contents_for_query(
    pool: &PgPool,
    search_query_id: i64,
) -> Result<Vec<ContentRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentRow>(&format!(
        "SELECT {CONTENT_COLUMNS} FROM contents \
         WHERE search_query_id = $1 \
         ORDER BY engagement_score DESC, id ASC"
    ))
    .bind(search_query_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the `limit` highest-scoring content rows of a query.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_contents_for_query(
    pool: &PgPool,
    search_query_id: i64,
    limit: i64,
) -> Result<Vec<ContentRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentRow>(&format!(
        "SELECT {CONTENT_COLUMNS} FROM contents \
         WHERE search_query_id = $1 \
         ORDER BY engagement_score DESC, id ASC \
         LIMIT $2"
    ))
    .bind(search_query_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
