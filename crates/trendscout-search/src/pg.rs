//! [`SearchStore`] backed by Postgres through `trendscout-db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trendscout_core::{ContentDraft, PlanTier};
use trendscout_db::{ContentRow, NewSearchQuery, PlatformCountRow, SearchQueryRow, UserRow};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Content, NewSearch, PlatformCount, QuotaPeriod, SearchQuery, User};
use crate::store::SearchStore;

#[derive(Clone)]
pub struct PgSearchStore {
    pool: PgPool,
}

impl PgSearchStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            external_id: row.external_id,
            email: row.email,
            display_name: row.display_name,
            plan_tier: row.plan_tier.parse()?,
            search_quota: row.search_quota,
            searches_used: row.searches_used,
            quota_reset_date: row.quota_reset_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<SearchQueryRow> for SearchQuery {
    type Error = StoreError;

    fn try_from(row: SearchQueryRow) -> Result<Self, Self::Error> {
        let max_results = u32::try_from(row.max_results).map_err(|_| {
            StoreError::Corrupt(format!(
                "search query {} has max_results {}",
                row.id, row.max_results
            ))
        })?;

        Ok(SearchQuery {
            id: row.id,
            public_id: row.public_id,
            user_id: row.user_id,
            keyword: row.keyword,
            platform: row.platform.parse()?,
            target_url: row.target_url,
            max_results,
            status: row.status.parse()?,
            external_run_id: row.external_run_id,
            result_count: row.result_count,
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

impl TryFrom<ContentRow> for Content {
    type Error = StoreError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        Ok(Content {
            id: row.id,
            search_query_id: row.search_query_id,
            external_id: row.external_id,
            platform: row.platform.parse()?,
            url: row.url,
            caption: row.caption,
            media_urls: row.media_urls,
            page_name: row.page_name,
            page_url: row.page_url,
            posted_at: row.posted_at,
            likes: row.likes,
            comments: row.comments,
            shares: row.shares,
            views: row.views,
            engagement_score: row.engagement_score,
            reactions: row.reactions,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<PlatformCountRow> for PlatformCount {
    type Error = StoreError;

    fn try_from(row: PlatformCountRow) -> Result<Self, Self::Error> {
        Ok(PlatformCount {
            platform: row.platform.parse()?,
            search_count: row.search_count,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl SearchStore for PgSearchStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(trendscout_db::health_check(&self.pool).await?)
    }

    async fn find_or_create_user(
        &self,
        external_id: &str,
        email: &str,
        display_name: Option<&str>,
        plan: PlanTier,
    ) -> Result<User, StoreError> {
        trendscout_db::find_or_create_user(
            &self.pool,
            external_id,
            email,
            display_name,
            plan.as_str(),
            plan.default_quota(),
        )
        .await?
        .try_into()
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        trendscout_db::get_user(&self.pool, user_id)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        trendscout_db::get_user_by_external_id(&self.pool, external_id)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn update_profile(
        &self,
        user_id: i64,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        trendscout_db::update_user_profile(&self.pool, user_id, email, display_name)
            .await?
            .try_into()
    }

    async fn set_plan(
        &self,
        user_id: i64,
        plan: PlanTier,
        search_quota: i32,
    ) -> Result<User, StoreError> {
        trendscout_db::set_user_plan(&self.pool, user_id, plan.as_str(), search_quota)
            .await?
            .try_into()
    }

    async fn refresh_quota_period(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotaPeriod>, StoreError> {
        let row = trendscout_db::refresh_quota_period(&self.pool, user_id, now).await?;
        Ok(row.map(|r| QuotaPeriod {
            search_quota: r.search_quota,
            searches_used: r.searches_used,
            quota_reset_date: r.quota_reset_date,
            was_reset: r.was_reset,
        }))
    }

    async fn increment_searches_used(&self, user_id: i64) -> Result<(), StoreError> {
        Ok(trendscout_db::increment_searches_used(&self.pool, user_id).await?)
    }

    async fn create_search(&self, search: NewSearch) -> Result<SearchQuery, StoreError> {
        let max_results = i32::try_from(search.max_results)
            .map_err(|_| StoreError::Rejected(format!("max_results {}", search.max_results)))?;

        trendscout_db::create_search_query(
            &self.pool,
            NewSearchQuery {
                user_id: search.user_id,
                keyword: &search.keyword,
                platform: search.platform.as_str(),
                target_url: &search.target_url,
                max_results,
            },
        )
        .await?
        .try_into()
    }

    async fn mark_processing(&self, id: i64) -> Result<(), StoreError> {
        Ok(trendscout_db::start_search_query(&self.pool, id).await?)
    }

    async fn mark_completed(
        &self,
        id: i64,
        result_count: i32,
        external_run_id: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(trendscout_db::complete_search_query(&self.pool, id, result_count, external_run_id).await?)
    }

    async fn mark_failed(&self, id: i64, error_message: &str) -> Result<(), StoreError> {
        Ok(trendscout_db::fail_search_query(&self.pool, id, error_message).await?)
    }

    async fn get_search(&self, id: i64) -> Result<Option<SearchQuery>, StoreError> {
        trendscout_db::get_search_query(&self.pool, id)
            .await?
            .map(SearchQuery::try_from)
            .transpose()
    }

    async fn get_search_for_user(
        &self,
        user_id: i64,
        public_id: Uuid,
    ) -> Result<Option<SearchQuery>, StoreError> {
        trendscout_db::get_search_query_for_user(&self.pool, user_id, public_id)
            .await?
            .map(SearchQuery::try_from)
            .transpose()
    }

    async fn list_searches_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<SearchQuery>, StoreError> {
        convert_all(trendscout_db::list_search_queries_for_user(&self.pool, user_id, limit).await?)
    }

    async fn upsert_content(
        &self,
        search_query_id: i64,
        draft: &ContentDraft,
    ) -> Result<Content, StoreError> {
        trendscout_db::upsert_content(&self.pool, search_query_id, draft)
            .await?
            .try_into()
    }

    async fn list_contents(&self, search_query_id: i64) -> Result<Vec<Content>, StoreError> {
        convert_all(trendscout_db::list_contents_for_query(&self.pool, search_query_id).await?)
    }

    async fn top_contents_for_search(
        &self,
        search_query_id: i64,
        limit: i64,
    ) -> Result<Vec<Content>, StoreError> {
        convert_all(
            trendscout_db::list_top_contents_for_query(&self.pool, search_query_id, limit).await?,
        )
    }

    async fn count_searches_for_user(&self, user_id: i64) -> Result<i64, StoreError> {
        Ok(trendscout_db::count_search_queries_for_user(&self.pool, user_id).await?)
    }

    async fn count_contents_for_user(&self, user_id: i64) -> Result<i64, StoreError> {
        Ok(trendscout_db::count_contents_for_user(&self.pool, user_id).await?)
    }

    async fn top_contents_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Content>, StoreError> {
        convert_all(trendscout_db::list_top_contents_for_user(&self.pool, user_id, limit).await?)
    }

    async fn platform_distribution(
        &self,
        user_id: i64,
    ) -> Result<Vec<PlatformCount>, StoreError> {
        convert_all(trendscout_db::list_platform_distribution_for_user(&self.pool, user_id).await?)
    }

    async fn fail_stale_searches(
        &self,
        created_before: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        Ok(trendscout_db::fail_stale_search_queries(&self.pool, created_before, error_message).await?)
    }
}
