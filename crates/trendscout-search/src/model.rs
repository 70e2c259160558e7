//! Typed domain records returned by a [`crate::SearchStore`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use trendscout_core::{PlanTier, Platform, SearchStatus};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub plan_tier: PlanTier,
    pub search_quota: i32,
    pub searches_used: i32,
    pub quota_reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quota counters as they stand after a lazy period refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPeriod {
    pub search_quota: i32,
    pub searches_used: i32,
    pub quota_reset_date: DateTime<Utc>,
    /// `true` when the refresh rolled the user into a new calendar month.
    pub was_reset: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    #[serde(skip)]
    pub id: i64,
    /// Identifier handed to callers; internal ids never leave the process.
    #[serde(rename = "id")]
    pub public_id: Uuid,
    #[serde(skip)]
    pub user_id: i64,
    pub keyword: String,
    pub platform: Platform,
    pub target_url: String,
    pub max_results: u32,
    pub status: SearchStatus,
    pub external_run_id: Option<String>,
    pub result_count: Option<i32>,
    /// Raw diagnostic text of a failure. Not safe to show to users.
    #[serde(skip)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for [`crate::SearchStore::create_search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSearch {
    pub user_id: i64,
    pub keyword: String,
    pub platform: Platform,
    pub target_url: String,
    pub max_results: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub search_query_id: i64,
    pub external_id: String,
    pub platform: Platform,
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

/// Number of searches a user ran on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformCount {
    pub platform: Platform,
    pub search_count: i64,
}

/// A query together with its ranked contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub query: SearchQuery,
    pub contents: Vec<Content>,
}

/// What callers are told about a failed search; the raw cause stays in
/// [`SearchQuery::error_message`].
pub const SEARCH_FAILED_MESSAGE: &str =
    "The search could not be completed. Please try again in a few minutes.";

impl SearchQuery {
    /// User-safe explanation of the query's state, if it needs one.
    #[must_use]
    pub fn public_message(&self) -> Option<&'static str> {
        (self.status == SearchStatus::Failed).then_some(SEARCH_FAILED_MESSAGE)
    }
}
