//! Database operations for `users` and their monthly search quota.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

const USER_COLUMNS: &str = "id, external_id, email, display_name, plan_tier, search_quota, \
                            searches_used, quota_reset_date, created_at, updated_at";

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    /// Subject identifier issued by the identity provider.
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// One of `FREE`, `STARTER`, `PRO`, `ENTERPRISE`.
    pub plan_tier: String,
    pub search_quota: i32,
    pub searches_used: i32,
    /// Anchor of the current quota period; only its calendar month matters.
    pub quota_reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quota counters after [`refresh_quota_period`] ran.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuotaPeriodRow {
    pub search_quota: i32,
    pub searches_used: i32,
    pub quota_reset_date: DateTime<Utc>,
    /// `true` when this call rolled the user into a new period.
    pub was_reset: bool,
}

/// Returns the user provisioned for `external_id`, creating it on first contact.
///
/// An existing row is returned untouched: `email` and `display_name` only
/// seed newly created users.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn find_or_create_user(
    pool: &PgPool,
    external_id: &str,
    email: &str,
    display_name: Option<&str>,
    plan_tier: &str,
    search_quota: i32,
) -> Result<UserRow, DbError> {
    // The no-op DO UPDATE makes RETURNING yield the existing row on conflict.
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (external_id, email, display_name, plan_tier, search_quota) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(external_id)
    .bind(email)
    .bind(display_name)
    .bind(plan_tier)
    .bind(search_quota)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a user by internal id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches a user by identity-provider subject.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user_by_external_id(
    pool: &PgPool,
    external_id: &str,
) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
    ))
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lazily rolls the user's quota period over to the calendar month of `now`.
///
/// In one statement: when the stored anchor falls in a different UTC calendar
/// month than `now`, `searches_used` is zeroed and the anchor moves to `now`;
/// otherwise the counters are left alone. The row is locked for the duration
/// of the statement, so two concurrent refreshes cannot both observe the old
/// period.
///
/// Returns `None` when the user does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn refresh_quota_period(
    pool: &PgPool,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<QuotaPeriodRow>, DbError> {
    let row = sqlx::query_as::<_, QuotaPeriodRow>(
        "WITH prev AS ( \
             SELECT id, \
                    date_trunc('month', quota_reset_date AT TIME ZONE 'UTC') \
                        <> date_trunc('month', $2::timestamptz AT TIME ZONE 'UTC') AS rolled \
             FROM users \
             WHERE id = $1 \
             FOR UPDATE \
         ) \
         UPDATE users u SET \
             searches_used    = CASE WHEN prev.rolled THEN 0 ELSE u.searches_used END, \
             quota_reset_date = CASE WHEN prev.rolled THEN $2::timestamptz \
                                     ELSE u.quota_reset_date END, \
             updated_at       = CASE WHEN prev.rolled THEN NOW() ELSE u.updated_at END \
         FROM prev \
         WHERE u.id = prev.id \
         RETURNING u.search_quota, u.searches_used, u.quota_reset_date, prev.rolled AS was_reset",
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Atomically adds one search to the user's usage counter.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn increment_searches_used(pool: &PgPool, user_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE users SET searches_used = searches_used + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Updates profile fields. `None` leaves the stored value unchanged.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_user_profile(
    pool: &PgPool,
    user_id: i64,
    email: Option<&str>,
    display_name: Option<&str>,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET \
             email        = COALESCE($2, email), \
             display_name = COALESCE($3, display_name), \
             updated_at   = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(email)
    .bind(display_name)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Moves the user to another plan tier and its search quota.
///
/// `searches_used` is not touched; an upgrade takes effect mid-period.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the user does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn set_user_plan(
    pool: &PgPool,
    user_id: i64,
    plan_tier: &str,
    search_quota: i32,
) -> Result<UserRow, DbError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET plan_tier = $2, search_quota = $3, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(plan_tier)
    .bind(search_quota)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
