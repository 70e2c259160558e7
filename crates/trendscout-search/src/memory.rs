//! In-process [`SearchStore`] for tests, local runs without Postgres, and the
//! CLI's dry runs.
//!
//! All state sits behind one `tokio::sync::Mutex`, so every trait method is
//! atomic the way the corresponding single SQL statement is. Text containing
//! a NUL byte is rejected, matching what Postgres does with `text` columns.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::sync::Mutex;
use trendscout_core::{ContentDraft, PlanTier, SearchStatus};
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{Content, NewSearch, PlatformCount, QuotaPeriod, SearchQuery, User};
use crate::store::SearchStore;

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    searches: Vec<SearchQuery>,
    contents: Vec<Content>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_mut(&mut self, user_id: i64) -> Result<&mut User, StoreError> {
        self.users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound)
    }

    fn search_mut(&mut self, id: i64) -> Result<&mut SearchQuery, StoreError> {
        self.searches
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn owned_search_ids(&self, user_id: i64) -> Vec<i64> {
        self.searches
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect()
    }

    /// Applies a guarded status change, mirroring the `WHERE status = ...`
    /// guard of the SQL backend.
    fn transition(
        &mut self,
        id: i64,
        next: SearchStatus,
        expected: &'static str,
    ) -> Result<&mut SearchQuery, StoreError> {
        let search = self
            .searches
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(StoreError::InvalidTransition { id, expected })?;
        if !search.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition { id, expected });
        }
        search.status = next;
        Ok(search)
    }
}

fn ranked(mut contents: Vec<Content>) -> Vec<Content> {
    contents.sort_by(|a, b| {
        b.engagement_score
            .cmp(&a.engagement_score)
            .then(a.id.cmp(&b.id))
    });
    contents
}

fn reject_nul(field: &str, value: Option<&str>) -> Result<(), StoreError> {
    if value.is_some_and(|v| v.contains('\0')) {
        return Err(StoreError::Rejected(format!(
            "{field} contains a NUL byte"
        )));
    }
    Ok(())
}

fn check_draft(draft: &ContentDraft) -> Result<(), StoreError> {
    reject_nul("external_id", Some(&draft.external_id))?;
    reject_nul("url", draft.url.as_deref())?;
    reject_nul("caption", draft.caption.as_deref())?;
    reject_nul("page_name", draft.page_name.as_deref())?;
    reject_nul("page_url", draft.page_url.as_deref())?;
    for url in &draft.media_urls {
        reject_nul("media_urls", Some(url))?;
    }
    Ok(())
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a user's quota counters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user does not exist.
    pub async fn set_quota_state(
        &self,
        user_id: i64,
        searches_used: i32,
        quota_reset_date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id)?;
        user.searches_used = searches_used;
        user.quota_reset_date = quota_reset_date;
        Ok(())
    }

    /// Moves a query's creation time, for exercising the stale sweep.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the query does not exist.
    pub async fn set_created_at(
        &self,
        id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.search_mut(id)?.created_at = created_at;
        Ok(())
    }

    /// Number of stored searches across all users.
    pub async fn search_count(&self) -> usize {
        self.inner.lock().await.searches.len()
    }
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_or_create_user(
        &self,
        external_id: &str,
        email: &str,
        display_name: Option<&str>,
        plan: PlanTier,
    ) -> Result<User, StoreError> {
        reject_nul("external_id", Some(external_id))?;
        reject_nul("email", Some(email))?;
        reject_nul("display_name", display_name)?;

        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.users.iter().find(|u| u.external_id == external_id) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let user = User {
            id: inner.next_id(),
            external_id: external_id.to_string(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            plan_tier: plan,
            search_quota: plan.default_quota(),
            searches_used: 0,
            quota_reset_date: now,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        reject_nul("email", email)?;
        reject_nul("display_name", display_name)?;

        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id)?;
        if let Some(email) = email {
            user.email = email.to_string();
        }
        if let Some(name) = display_name {
            user.display_name = Some(name.to_string());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_plan(
        &self,
        user_id: i64,
        plan: PlanTier,
        search_quota: i32,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id)?;
        user.plan_tier = plan;
        user.search_quota = search_quota;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn refresh_quota_period(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<QuotaPeriod>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(None);
        };

        let anchor = user.quota_reset_date;
        let rolled = (anchor.year(), anchor.month()) != (now.year(), now.month());
        if rolled {
            user.searches_used = 0;
            user.quota_reset_date = now;
            user.updated_at = Utc::now();
        }

        Ok(Some(QuotaPeriod {
            search_quota: user.search_quota,
            searches_used: user.searches_used,
            quota_reset_date: user.quota_reset_date,
            was_reset: rolled,
        }))
    }

    async fn increment_searches_used(&self, user_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id)?;
        user.searches_used = user.searches_used.saturating_add(1);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn create_search(&self, search: NewSearch) -> Result<SearchQuery, StoreError> {
        reject_nul("keyword", Some(&search.keyword))?;
        reject_nul("target_url", Some(&search.target_url))?;

        let mut inner = self.inner.lock().await;
        if !inner.users.iter().any(|u| u.id == search.user_id) {
            return Err(StoreError::Rejected(format!(
                "user {} does not exist",
                search.user_id
            )));
        }

        let query = SearchQuery {
            id: inner.next_id(),
            public_id: Uuid::new_v4(),
            user_id: search.user_id,
            keyword: search.keyword,
            platform: search.platform,
            target_url: search.target_url,
            max_results: search.max_results,
            status: SearchStatus::Pending,
            external_run_id: None,
            result_count: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        inner.searches.push(query.clone());
        Ok(query)
    }

    async fn mark_processing(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let search = inner.transition(id, SearchStatus::Processing, "PENDING")?;
        search.started_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: i64,
        result_count: i32,
        external_run_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let search = inner.transition(id, SearchStatus::Completed, "PROCESSING")?;
        search.result_count = Some(result_count);
        search.external_run_id = external_run_id.map(str::to_string);
        search.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error_message: &str) -> Result<(), StoreError> {
        reject_nul("error_message", Some(error_message))?;
        let mut inner = self.inner.lock().await;
        let search = inner.transition(id, SearchStatus::Failed, "PENDING or PROCESSING")?;
        search.error_message = Some(error_message.to_string());
        search.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get_search(&self, id: i64) -> Result<Option<SearchQuery>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.searches.iter().find(|s| s.id == id).cloned())
    }

    async fn get_search_for_user(
        &self,
        user_id: i64,
        public_id: Uuid,
    ) -> Result<Option<SearchQuery>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .searches
            .iter()
            .find(|s| s.public_id == public_id && s.user_id == user_id)
            .cloned())
    }

    async fn list_searches_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<SearchQuery>, StoreError> {
        let inner = self.inner.lock().await;
        let mut searches: Vec<SearchQuery> = inner
            .searches
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        searches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        searches.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(searches)
    }

    async fn upsert_content(
        &self,
        search_query_id: i64,
        draft: &ContentDraft,
    ) -> Result<Content, StoreError> {
        check_draft(draft)?;

        let mut inner = self.inner.lock().await;
        if !inner.searches.iter().any(|s| s.id == search_query_id) {
            return Err(StoreError::Rejected(format!(
                "search query {search_query_id} does not exist"
            )));
        }

        let now = Utc::now();
        if let Some(existing) = inner
            .contents
            .iter_mut()
            .find(|c| c.search_query_id == search_query_id && c.external_id == draft.external_id)
        {
            existing.likes = draft.likes;
            existing.comments = draft.comments;
            existing.shares = draft.shares;
            existing.views = draft.views;
            existing.engagement_score = draft.engagement_score;
            existing.reactions.clone_from(&draft.reactions);
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let content = Content {
            id: inner.next_id(),
            search_query_id,
            external_id: draft.external_id.clone(),
            platform: draft.platform,
            url: draft.url.clone(),
            caption: draft.caption.clone(),
            media_urls: draft.media_urls.clone(),
            page_name: draft.page_name.clone(),
            page_url: draft.page_url.clone(),
            posted_at: draft.posted_at,
            likes: draft.likes,
            comments: draft.comments,
            shares: draft.shares,
            views: draft.views,
            engagement_score: draft.engagement_score,
            reactions: draft.reactions.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.contents.push(content.clone());
        Ok(content)
    }

    async fn list_contents(&self, search_query_id: i64) -> Result<Vec<Content>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(ranked(
            inner
                .contents
                .iter()
                .filter(|c| c.search_query_id == search_query_id)
                .cloned()
                .collect(),
        ))
    }

    async fn top_contents_for_search(
        &self,
        search_query_id: i64,
        limit: i64,
    ) -> Result<Vec<Content>, StoreError> {
        let mut contents = self.list_contents(search_query_id).await?;
        contents.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(contents)
    }

    async fn count_searches_for_user(&self, user_id: i64) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        let count = inner.searches.iter().filter(|s| s.user_id == user_id).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn count_contents_for_user(&self, user_id: i64) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        let owned = inner.owned_search_ids(user_id);
        let count = inner
            .contents
            .iter()
            .filter(|c| owned.contains(&c.search_query_id))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn top_contents_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<Content>, StoreError> {
        let inner = self.inner.lock().await;
        let owned = inner.owned_search_ids(user_id);
        let mut contents = ranked(
            inner
                .contents
                .iter()
                .filter(|c| owned.contains(&c.search_query_id))
                .cloned()
                .collect(),
        );
        contents.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(contents)
    }

    async fn platform_distribution(
        &self,
        user_id: i64,
    ) -> Result<Vec<PlatformCount>, StoreError> {
        let inner = self.inner.lock().await;
        let mut counts: Vec<PlatformCount> = Vec::new();
        for search in inner.searches.iter().filter(|s| s.user_id == user_id) {
            match counts.iter_mut().find(|c| c.platform == search.platform) {
                Some(entry) => entry.search_count += 1,
                None => counts.push(PlatformCount {
                    platform: search.platform,
                    search_count: 1,
                }),
            }
        }
        counts.sort_by(|a, b| {
            b.search_count
                .cmp(&a.search_count)
                .then_with(|| a.platform.as_str().cmp(b.platform.as_str()))
        });
        Ok(counts)
    }

    async fn fail_stale_searches(
        &self,
        created_before: DateTime<Utc>,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut failed = 0u64;
        for search in inner
            .searches
            .iter_mut()
            .filter(|s| !s.status.is_terminal() && s.created_at < created_before)
        {
            search.status = SearchStatus::Failed;
            search.error_message = Some(error_message.to_string());
            search.completed_at = Some(now);
            failed += 1;
        }
        Ok(failed)
    }
}
