//! The repository interface the search pipeline persists through.
//!
//! Every read that takes a `user_id` filters by owner inside the backend;
//! callers never post-filter. Lifecycle writes are guarded: a backend must
//! reject a transition from the wrong status with
//! [`StoreError::InvalidTransition`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trendscout_core::{ContentDraft, PlanTier};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Content, NewSearch, PlatformCount, QuotaPeriod, SearchQuery, User};

#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Liveness check of the backend.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Returns the user for `external_id`, creating it with `plan` and the
    /// plan's default quota on first contact. Existing users are returned
    /// unchanged.
    async fn find_or_create_user(
        &self,
        external_id: &str,
        email: &str,
        display_name: Option<&str>,
        plan: PlanTier,
    ) -> Result<User, StoreError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    async fn get_user_by_external_id(&self, external_id: &str)
        -> Result<Option<User>, StoreError>;

    /// `None` leaves a field unchanged.
    async fn update_profile(
        &self,
        user_id: i64,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<User, StoreError>;

    /// Sets tier and ceiling; `searches_used` is untouched.
    async fn set_plan(
        &self,
        user_id: i64,
        plan: PlanTier,
        search_quota: i32,
    ) -> Result<User, StoreError>;

    /// Atomically zeroes usage and moves the anchor to `now` when `now` lies
    /// in a later calendar month (UTC) than the stored anchor. `None` when the
    /// user does not exist.
    async fn refresh_quota_period(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotaPeriod>, StoreError>;

    /// Atomically adds one to `searches_used`.
    async fn increment_searches_used(&self, user_id: i64) -> Result<(), StoreError>;

    /// Inserts a query in `PENDING`.
    async fn create_search(&self, search: NewSearch) -> Result<SearchQuery, StoreError>;

    /// `PENDING -> PROCESSING`.
    async fn mark_processing(&self, id: i64) -> Result<(), StoreError>;

    /// `PROCESSING -> COMPLETED`, setting the result count exactly once.
    async fn mark_completed(
        &self,
        id: i64,
        result_count: i32,
        external_run_id: Option<&str>,
    ) -> Result<(), StoreError>;

    /// `PENDING | PROCESSING -> FAILED`.
    async fn mark_failed(&self, id: i64, error_message: &str) -> Result<(), StoreError>;

    /// Internal lookup without an owner check. Background work only.
    async fn get_search(&self, id: i64) -> Result<Option<SearchQuery>, StoreError>;

    async fn get_search_for_user(
        &self,
        user_id: i64,
        public_id: Uuid,
    ) -> Result<Option<SearchQuery>, StoreError>;

    /// Newest first.
    async fn list_searches_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<SearchQuery>, StoreError>;

    /// Upserts on `(search_query_id, external_id)`. On conflict only the
    /// counters, score, and reactions are overwritten.
    async fn upsert_content(
        &self,
        search_query_id: i64,
        draft: &ContentDraft,
    ) -> Result<Content, StoreError>;

    /// Ranked by score descending, ties by insertion order.
    async fn list_contents(&self, search_query_id: i64) -> Result<Vec<Content>, StoreError>;

    async fn top_contents_for_search(
        &self,
        search_query_id: i64,
        limit: i64,
    ) -> Result<Vec<Content>, StoreError>;

    async fn count_searches_for_user(&self, user_id: i64) -> Result<i64, StoreError>;

    async fn count_contents_for_user(&self, user_id: i64) -> Result<i64, StoreError>;

    async fn top_contents_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Content>, StoreError>;

    /// Most-used platform first.
    async fn platform_distribution(&self, user_id: i64)
        -> Result<Vec<PlatformCount>, StoreError>;

    /// Fails every open query created before `created_before`; returns how
    /// many were failed.
    async fn fail_stale_searches(
        &self,
        created_before: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError>;
}
