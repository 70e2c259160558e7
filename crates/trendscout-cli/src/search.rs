//! `search` and `quota` command handlers.
//!
//! Both run against the same Postgres-backed store the server uses. Output
//! goes to stdout; logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use trendscout_core::{AppConfig, Platform, SearchRequest};
use trendscout_scraper::ApifyClient;
use trendscout_search::{
    accounts, Content, PgSearchStore, QuotaLedger, SearchOrchestrator, SearchResult, SearchStore,
};

const CAPTION_PREVIEW_CHARS: usize = 60;

/// Runs one search to completion as `external_id` and prints the ranking.
///
/// # Errors
///
/// Returns an error if `APIFY_TOKEN` is missing, the request is rejected
/// (validation or quota), or the database fails. A content source failure is
/// reported as a `FAILED` search, not an error.
pub(crate) async fn run_search(
    pool: PgPool,
    config: &AppConfig,
    external_id: &str,
    keyword: String,
    platform: Platform,
    max_results: Option<u32>,
) -> anyhow::Result<()> {
    let Some(token) = config.apify_token.as_deref() else {
        anyhow::bail!("APIFY_TOKEN is required to run searches");
    };
    let client = ApifyClient::with_base_url(
        token,
        &config.apify_base_url,
        config.source_max_retries,
        config.source_retry_backoff_base_ms,
    )?;

    let store: Arc<dyn SearchStore> = Arc::new(PgSearchStore::new(pool));
    let user = accounts::provision_user(store.as_ref(), external_id, None, None).await?;
    let orchestrator = SearchOrchestrator::new(
        store,
        Arc::new(client),
        Duration::from_secs(config.source_timeout_secs),
    );

    let result = orchestrator
        .run_sync(
            user.id,
            SearchRequest {
                keyword,
                platform,
                max_results,
            },
        )
        .await?;

    print!("{}", render_result(&result));
    Ok(())
}

/// Prints the quota of an existing user.
///
/// # Errors
///
/// Returns an error if the user is unknown or the database fails.
pub(crate) async fn show_quota(pool: PgPool, external_id: &str) -> anyhow::Result<()> {
    let store: Arc<dyn SearchStore> = Arc::new(PgSearchStore::new(pool));
    let Some(user) = store.get_user_by_external_id(external_id).await? else {
        anyhow::bail!("no user with identity subject {external_id:?}");
    };

    let view = QuotaLedger::new(store).quota_view(user.id, Utc::now()).await?;
    println!("user:       {external_id}");
    println!("plan:       {}", view.plan);
    println!("used:       {} of {}", view.used, view.quota);
    println!("remaining:  {}", view.remaining);
    println!("period:     {}", view.period_start.format("%Y-%m-%d"));
    println!("resets at:  {}", view.resets_at.format("%Y-%m-%d %H:%M UTC"));
    Ok(())
}

fn render_result(result: &SearchResult) -> String {
    let query = &result.query;
    let mut out = format!(
        "search {} [{}] {} on {}\ntarget: {}\n",
        query.public_id, query.status, query.keyword, query.platform, query.target_url
    );
    if let Some(message) = query.public_message() {
        out.push_str(message);
        out.push('\n');
        if let Some(cause) = query.error_message.as_deref() {
            out.push_str(&format!("cause: {cause}\n"));
        }
        return out;
    }

    out.push_str(&format!("{} posts\n", result.contents.len()));
    for (rank, content) in result.contents.iter().enumerate() {
        out.push_str(&render_row(rank + 1, content));
        out.push('\n');
    }
    out
}

fn render_row(rank: usize, content: &Content) -> String {
    let caption: String = content
        .caption
        .as_deref()
        .unwrap_or("")
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(CAPTION_PREVIEW_CHARS)
        .collect();
    format!(
        "{rank:>3}. score {:>8}  likes {:>7}  comments {:>6}  shares {:>6}  {}  {}",
        content.engagement_score,
        content.likes,
        content.comments,
        content.shares,
        content.url.as_deref().unwrap_or(&content.external_id),
        caption.trim(),
    )
}
