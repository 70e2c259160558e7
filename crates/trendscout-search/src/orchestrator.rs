//! The per-query state machine.
//!
//! `PENDING` is written on submission, before anything external happens.
//! [`SearchOrchestrator::execute`] then moves the query to `PROCESSING`,
//! waits for the content source under a hard timeout, reconciles the
//! returned posts, and finishes with `COMPLETED` (charging one unit of quota)
//! or `FAILED` (charging nothing). Synchronous and queued searches both go
//! through [`SearchOrchestrator::submit`] and [`SearchOrchestrator::execute`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use trendscout_core::{SearchRequest, SearchStatus};
use trendscout_scraper::{normalize_batch, resolve_target, ContentSource, SourceRequest};
use uuid::Uuid;

use crate::error::{SearchError, StoreError};
use crate::model::{NewSearch, SearchQuery, SearchResult};
use crate::quota::QuotaLedger;
use crate::reconcile::reconcile;
use crate::store::SearchStore;

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;
/// Longest diagnostic written to a failed query, in characters.
const MAX_FAILURE_MESSAGE_CHARS: usize = 2000;

#[derive(Clone)]
pub struct SearchOrchestrator {
    store: Arc<dyn SearchStore>,
    source: Arc<dyn ContentSource>,
    ledger: QuotaLedger,
    source_timeout: Duration,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn SearchStore>,
        source: Arc<dyn ContentSource>,
        source_timeout: Duration,
    ) -> Self {
        Self {
            ledger: QuotaLedger::new(Arc::clone(&store)),
            store,
            source,
            source_timeout,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    #[must_use]
    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// Validates the request, checks quota, and records the query as `PENDING`.
    ///
    /// Nothing is written when validation or the quota check fails.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Validation`] for a bad keyword or result cap.
    /// - [`SearchError::QuotaExceeded`] when the period's allowance is used up.
    /// - [`SearchError::Store`] if the backend fails.
    pub async fn submit(
        &self,
        user_id: i64,
        request: SearchRequest,
    ) -> Result<SearchQuery, SearchError> {
        let search = request.validate()?;

        if !self.ledger.check_quota(user_id, Utc::now()).await? {
            let (used, quota) = match self.store.get_user(user_id).await? {
                Some(user) => (user.searches_used, user.search_quota),
                None => (0, 0),
            };
            tracing::info!(user_id, used, quota, "search refused: quota exhausted");
            return Err(SearchError::QuotaExceeded { used, quota });
        }

        let target_url = resolve_target(&search.keyword, search.platform);
        let query = self
            .store
            .create_search(NewSearch {
                user_id,
                keyword: search.keyword,
                platform: search.platform,
                target_url,
                max_results: search.max_results,
            })
            .await?;

        tracing::info!(
            user_id,
            search_id = %query.public_id,
            platform = %query.platform,
            target_url = %query.target_url,
            "search submitted"
        );
        Ok(query)
    }

    /// Drives a `PENDING` query to a terminal status and returns it with its
    /// ranked contents.
    ///
    /// A content source failure or timeout is not an error here: the query
    /// ends `FAILED` and is returned as such. When a lifecycle write fails,
    /// the query is failed on a best-effort basis and, if it is terminal by
    /// then (including when a stale sweep got there first), returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Incomplete`], carrying the query's public id,
    /// when the backend fails and the query could not be made terminal.
    pub async fn execute(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        match self.drive(query).await {
            Ok(result) => Ok(result),
            Err(e) => self.recover(query, e).await,
        }
    }

    /// Submits and executes in one call, returning only once the query is
    /// terminal.
    ///
    /// # Errors
    ///
    /// As [`Self::submit`] and [`Self::execute`].
    pub async fn run_sync(
        &self,
        user_id: i64,
        request: SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        let query = self.submit(user_id, request).await?;
        self.execute(&query).await
    }

    /// Loads one of the user's queries with its ranked contents.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::NotFound`] when the query does not exist or
    /// belongs to another user.
    pub async fn load_result(
        &self,
        user_id: i64,
        public_id: Uuid,
    ) -> Result<SearchResult, SearchError> {
        let query = self
            .store
            .get_search_for_user(user_id, public_id)
            .await?
            .ok_or(SearchError::NotFound)?;
        let contents = self.store.list_contents(query.id).await?;
        Ok(SearchResult { query, contents })
    }

    /// The user's most recent queries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Store`] if the backend fails.
    pub async fn list_searches(
        &self,
        user_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<SearchQuery>, SearchError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        Ok(self.store.list_searches_for_user(user_id, limit).await?)
    }

    async fn drive(&self, query: &SearchQuery) -> Result<SearchResult, StoreError> {
        let id = query.id;
        self.store.mark_processing(id).await?;

        let request = SourceRequest {
            platform: query.platform,
            target_urls: vec![query.target_url.clone()],
            max_results: query.max_results,
        };
        let fetched = tokio::time::timeout(self.source_timeout, self.source.fetch(&request)).await;

        let batch = match fetched {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                tracing::warn!(search_id = %query.public_id, error = %e, "content source failed");
                return self.finish_failed(query, &e.to_string()).await;
            }
            Err(_) => {
                let message = format!(
                    "content source did not finish within {}s",
                    self.source_timeout.as_secs()
                );
                tracing::warn!(search_id = %query.public_id, "{message}");
                return self.finish_failed(query, &message).await;
            }
        };

        let drafts = normalize_batch(batch.items, query.platform);
        let contents = reconcile(self.store.as_ref(), id, drafts).await;
        let result_count = i32::try_from(contents.len()).unwrap_or(i32::MAX);

        self.store
            .mark_completed(id, result_count, batch.run_id.as_deref())
            .await?;

        if let Err(e) = self.ledger.consume_quota(query.user_id).await {
            tracing::error!(
                user_id = query.user_id,
                search_id = %query.public_id,
                error = %e,
                "search completed but quota charge failed"
            );
        }

        tracing::info!(
            search_id = %query.public_id,
            result_count,
            run_id = batch.run_id.as_deref().unwrap_or(""),
            "search completed"
        );

        let query = self.reload(id).await?;
        Ok(SearchResult { query, contents })
    }

    /// Settles a query whose lifecycle write failed.
    async fn recover(
        &self,
        query: &SearchQuery,
        error: StoreError,
    ) -> Result<SearchResult, SearchError> {
        tracing::error!(search_id = %query.public_id, error = %error, "could not finish search");

        // A lost guard race means the row has already moved on.
        if !matches!(error, StoreError::InvalidTransition { .. }) {
            self.fail_best_effort(query.id, &format!("could not finish search: {error}"))
                .await;
        }

        let settled = match self.store.get_search(query.id).await {
            Ok(Some(row)) if row.status.is_terminal() => row,
            _ => {
                return Err(SearchError::Incomplete {
                    search_id: query.public_id,
                    source: error,
                })
            }
        };

        let contents = if settled.status == SearchStatus::Completed {
            match self.store.list_contents(settled.id).await {
                Ok(contents) => contents,
                Err(_) => {
                    return Err(SearchError::Incomplete {
                        search_id: query.public_id,
                        source: error,
                    })
                }
            }
        } else {
            Vec::new()
        };

        tracing::info!(
            search_id = %settled.public_id,
            status = %settled.status,
            "search settled after storage failure"
        );
        Ok(SearchResult {
            query: settled,
            contents,
        })
    }

    async fn finish_failed(
        &self,
        query: &SearchQuery,
        message: &str,
    ) -> Result<SearchResult, StoreError> {
        self.store
            .mark_failed(query.id, &failure_message(message))
            .await?;
        let query = self.reload(query.id).await?;
        Ok(SearchResult {
            query,
            contents: Vec::new(),
        })
    }

    async fn fail_best_effort(&self, id: i64, message: &str) {
        if let Err(e) = self.store.mark_failed(id, &failure_message(message)).await {
            tracing::warn!(search_query_id = id, error = %e, "could not mark search failed");
        }
    }

    async fn reload(&self, id: i64) -> Result<SearchQuery, StoreError> {
        self.store.get_search(id).await?.ok_or(StoreError::NotFound)
    }
}

/// Makes a diagnostic storable: text columns refuse NUL bytes, and upstream
/// error bodies can be arbitrarily long.
fn failure_message(raw: &str) -> String {
    let clean: String = raw.chars().filter(|&c| c != '\0').collect();
    match clean.char_indices().nth(MAX_FAILURE_MESSAGE_CHARS) {
        Some((cut, _)) => format!("{}...", &clean[..cut]),
        None => clean,
    }
}
