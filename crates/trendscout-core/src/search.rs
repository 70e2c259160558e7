//! Search-level domain types: target platforms, the query lifecycle, plan
//! tiers, and validation of user-submitted search requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const MAX_KEYWORD_CHARS: usize = 500;
pub const DEFAULT_MAX_RESULTS: u32 = 20;
pub const MAX_RESULTS_LIMIT: u32 = 100;

/// Social platform a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Facebook,
    Instagram,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Instagram, Platform::Tiktok];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Facebook => "FACEBOOK",
            Platform::Instagram => "INSTAGRAM",
            Platform::Tiktok => "TIKTOK",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FACEBOOK" => Ok(Platform::Facebook),
            "INSTAGRAM" => Ok(Platform::Instagram),
            "TIKTOK" => Ok(Platform::Tiktok),
            _ => Err(CoreError::InvalidPlatform(s.to_string())),
        }
    }
}

/// Lifecycle of a search query.
///
/// Transitions only move forward: `Pending -> Processing -> Completed | Failed`.
/// The stale-search sweep may also fail a query that never left `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SearchStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SearchStatus::Pending => "PENDING",
            SearchStatus::Processing => "PROCESSING",
            SearchStatus::Completed => "COMPLETED",
            SearchStatus::Failed => "FAILED",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SearchStatus::Completed | SearchStatus::Failed)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: SearchStatus) -> bool {
        matches!(
            (self, next),
            (SearchStatus::Pending, SearchStatus::Processing)
                | (
                    SearchStatus::Pending | SearchStatus::Processing,
                    SearchStatus::Failed
                )
                | (SearchStatus::Processing, SearchStatus::Completed)
        )
    }
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SearchStatus::Pending),
            "PROCESSING" => Ok(SearchStatus::Processing),
            "COMPLETED" => Ok(SearchStatus::Completed),
            "FAILED" => Ok(SearchStatus::Failed),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// Subscription tier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl PlanTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Starter => "STARTER",
            PlanTier::Pro => "PRO",
            PlanTier::Enterprise => "ENTERPRISE",
        }
    }

    /// Monthly search allowance granted by the tier.
    #[must_use]
    pub fn default_quota(self) -> i32 {
        match self {
            PlanTier::Free => 10,
            PlanTier::Starter => 100,
            PlanTier::Pro => 500,
            PlanTier::Enterprise => 5000,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(PlanTier::Free),
            "STARTER" => Ok(PlanTier::Starter),
            "PRO" => Ok(PlanTier::Pro),
            "ENTERPRISE" => Ok(PlanTier::Enterprise),
            _ => Err(CoreError::InvalidPlanTier(s.to_string())),
        }
    }
}

/// A search as submitted by a caller, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub keyword: String,
    pub platform: Platform,
    #[serde(default, alias = "maxPosts", alias = "maxResults")]
    pub max_results: Option<u32>,
}

/// A search request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSearch {
    /// Trimmed keyword, 1 to [`MAX_KEYWORD_CHARS`] characters.
    pub keyword: String,
    pub platform: Platform,
    /// Result cap passed to the content source, 1 to [`MAX_RESULTS_LIMIT`].
    pub max_results: u32,
}

impl SearchRequest {
    /// Validates the request, trimming the keyword and applying the default
    /// result cap.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] when the keyword is empty or too long,
    /// or when `max_results` falls outside `1..=100`.
    pub fn validate(self) -> Result<ValidatedSearch, CoreError> {
        let keyword = self.keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(CoreError::Validation("keyword must not be empty".into()));
        }
        let chars = keyword.chars().count();
        if chars > MAX_KEYWORD_CHARS {
            return Err(CoreError::Validation(format!(
                "keyword must be at most {MAX_KEYWORD_CHARS} characters (got {chars})"
            )));
        }

        let max_results = self.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
            return Err(CoreError::Validation(format!(
                "max_results must be between 1 and {MAX_RESULTS_LIMIT} (got {max_results})"
            )));
        }

        Ok(ValidatedSearch {
            keyword,
            platform: self.platform,
            max_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(keyword: &str, max_results: Option<u32>) -> SearchRequest {
        SearchRequest {
            keyword: keyword.to_string(),
            platform: Platform::Facebook,
            max_results,
        }
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("facebook".parse::<Platform>(), Ok(Platform::Facebook));
        assert_eq!("TikTok".parse::<Platform>(), Ok(Platform::Tiktok));
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_serializes_screaming_case() {
        let json = serde_json::to_string(&Platform::Instagram).unwrap();
        assert_eq!(json, "\"INSTAGRAM\"");
    }

    #[test]
    fn status_transitions_only_move_forward() {
        use SearchStatus::{Completed, Failed, Pending, Processing};
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SearchStatus::Pending,
            SearchStatus::Processing,
            SearchStatus::Completed,
            SearchStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SearchStatus>(), Ok(status));
        }
    }

    #[test]
    fn plan_tier_quotas_increase_with_tier() {
        assert!(PlanTier::Free.default_quota() < PlanTier::Starter.default_quota());
        assert!(PlanTier::Starter.default_quota() < PlanTier::Pro.default_quota());
        assert!(PlanTier::Pro.default_quota() < PlanTier::Enterprise.default_quota());
    }

    #[test]
    fn validate_trims_and_defaults_max_results() {
        let v = request("  ExamplePage  ", None).validate().unwrap();
        assert_eq!(v.keyword, "ExamplePage");
        assert_eq!(v.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn validate_rejects_blank_keyword() {
        let err = request("   ", None).validate().unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("empty")));
    }

    #[test]
    fn validate_rejects_overlong_keyword() {
        let keyword = "x".repeat(MAX_KEYWORD_CHARS + 1);
        assert!(request(&keyword, None).validate().is_err());
        let keyword = "x".repeat(MAX_KEYWORD_CHARS);
        assert!(request(&keyword, None).validate().is_ok());
    }

    #[test]
    fn validate_enforces_max_results_bounds() {
        assert!(request("page", Some(0)).validate().is_err());
        assert!(request("page", Some(101)).validate().is_err());
        assert_eq!(request("page", Some(100)).validate().unwrap().max_results, 100);
        assert_eq!(request("page", Some(1)).validate().unwrap().max_results, 1);
    }

    #[test]
    fn request_accepts_max_posts_alias() {
        let req: SearchRequest = serde_json::from_str(
            r#"{"keyword":"ExamplePage","platform":"FACEBOOK","maxPosts":20}"#,
        )
        .unwrap();
        assert_eq!(req.max_results, Some(20));
    }
}
