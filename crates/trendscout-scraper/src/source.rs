//! The content source seam used by the search pipeline.

use async_trait::async_trait;
use trendscout_core::Platform;

use crate::client::ApifyClient;
use crate::error::ScraperError;
use crate::types::{FacebookPostsInput, InstagramPostsInput, StartUrl, TiktokPostsInput};

/// Actor ID of `apify/facebook-posts-scraper`.
pub const FACEBOOK_POSTS_SCRAPER: &str = "KoJrdxJCTtpon81KY";

/// Actor ID of `apify/instagram-post-scraper`.
pub const INSTAGRAM_POST_SCRAPER: &str = "nH2AHrwxeTRJoN5hX";

/// `clockworks/tiktok-scraper`, addressed as `owner~name`.
pub const TIKTOK_SCRAPER: &str = "clockworks~tiktok-scraper";

/// What one search asks of the content source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub platform: Platform,
    pub target_urls: Vec<String>,
    pub max_results: u32,
}

/// Raw records returned by one completed run.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    /// Run identifier reported by the source, kept for audit.
    pub run_id: Option<String>,
    pub items: Vec<serde_json::Value>,
}

/// A service that collects raw posts for a target.
///
/// `fetch` returns only after the run has finished; it has no deadline of
/// its own. Dropping the future early should release whatever the source
/// started.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, request: &SourceRequest) -> Result<SourceBatch, ScraperError>;
}

#[must_use]
pub fn actor_for(platform: Platform) -> &'static str {
    match platform {
        Platform::Facebook => FACEBOOK_POSTS_SCRAPER,
        Platform::Instagram => INSTAGRAM_POST_SCRAPER,
        Platform::Tiktok => TIKTOK_SCRAPER,
    }
}

/// Splits TikTok targets into profile handles and direct video URLs.
fn tiktok_input(target_urls: &[String], max_results: u32) -> TiktokPostsInput {
    let mut profiles = Vec::new();
    let mut post_urls = Vec::new();
    for url in target_urls {
        let handle = url
            .split_once("/@")
            .map(|(_, rest)| rest.trim_end_matches('/'))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'));
        match handle {
            Some(handle) => profiles.push(handle.to_string()),
            None => post_urls.push(url.clone()),
        }
    }
    TiktokPostsInput {
        profiles,
        post_urls,
        results_per_page: max_results,
    }
}

#[async_trait]
impl ContentSource for ApifyClient {
    async fn fetch(&self, request: &SourceRequest) -> Result<SourceBatch, ScraperError> {
        let actor_id = actor_for(request.platform);
        let run = match request.platform {
            Platform::Facebook => {
                let input = FacebookPostsInput {
                    start_urls: request
                        .target_urls
                        .iter()
                        .map(|url| StartUrl { url: url.clone() })
                        .collect(),
                    results_limit: request.max_results,
                };
                self.start_run(actor_id, &input).await?
            }
            Platform::Instagram => {
                let input = InstagramPostsInput {
                    username: request.target_urls.clone(),
                    results_limit: request.max_results,
                };
                self.start_run(actor_id, &input).await?
            }
            Platform::Tiktok => {
                let input = tiktok_input(&request.target_urls, request.max_results);
                self.start_run(actor_id, &input).await?
            }
        };

        // Armed until the run is terminal: a caller timeout drops this future
        // mid-poll, and the run must not keep going upstream.
        let guard = self.abort_on_drop(&run.id);
        let completed = match self.wait_for_run(&run.id).await {
            Ok(completed) => {
                guard.disarm();
                completed
            }
            Err(e @ ScraperError::RunFailed { .. }) => {
                guard.disarm();
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let items = self.get_dataset_items(&completed.default_dataset_id).await?;
        tracing::info!(
            platform = %request.platform,
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            count = items.len(),
            "fetched content source items"
        );

        Ok(SourceBatch {
            run_id: Some(completed.id),
            items,
        })
    }
}

/// Stand-in used when no source credentials are configured. Every fetch
/// fails with [`ScraperError::NotConfigured`], so searches end `FAILED`
/// instead of the process refusing to start.
#[derive(Debug, Clone)]
pub struct UnconfiguredSource {
    reason: String,
}

impl UnconfiguredSource {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ContentSource for UnconfiguredSource {
    async fn fetch(&self, request: &SourceRequest) -> Result<SourceBatch, ScraperError> {
        tracing::warn!(platform = %request.platform, "content source requested but not configured");
        Err(ScraperError::NotConfigured(self.reason.clone()))
    }
}
