//! Read-only rollups over a user's own queries and contents.

use serde::Serialize;
use uuid::Uuid;

use crate::error::SearchError;
use crate::model::{Content, PlatformCount, SearchQuery};
use crate::store::SearchStore;

/// Contents counted into `total_engagement` and listed as top posts.
pub const DASHBOARD_TOP_CONTENTS: i64 = 10;
pub const DASHBOARD_RECENT_SEARCHES: i64 = 5;
pub const CHART_TOP_CONTENTS: i64 = 5;
const CHART_LABEL_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_searches: i64,
    pub total_contents: i64,
    /// Sum of scores of the top [`DASHBOARD_TOP_CONTENTS`] contents only.
    pub total_engagement: i64,
    pub recent_searches: Vec<SearchQuery>,
    pub top_contents: Vec<Content>,
    pub platform_distribution: Vec<PlatformCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// `"#1"`, `"#2"`, ...
    pub rank: String,
    pub label: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
    pub engagement_score: i64,
    pub reactions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChartTotals {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
    pub engagement_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub search_id: Uuid,
    pub points: Vec<ChartPoint>,
    pub totals: ChartTotals,
}

/// Dashboard totals, recent searches, leaderboard, and platform mix.
///
/// # Errors
///
/// Returns [`SearchError::Store`] if the backend fails.
pub async fn dashboard(store: &dyn SearchStore, user_id: i64) -> Result<DashboardStats, SearchError> {
    let total_searches = store.count_searches_for_user(user_id).await?;
    let total_contents = store.count_contents_for_user(user_id).await?;
    let top_contents = store
        .top_contents_for_user(user_id, DASHBOARD_TOP_CONTENTS)
        .await?;
    let recent_searches = store
        .list_searches_for_user(user_id, DASHBOARD_RECENT_SEARCHES)
        .await?;
    let platform_distribution = store.platform_distribution(user_id).await?;

    let total_engagement = top_contents
        .iter()
        .fold(0i64, |acc, c| acc.saturating_add(c.engagement_score));

    Ok(DashboardStats {
        total_searches,
        total_contents,
        total_engagement,
        recent_searches,
        top_contents,
        platform_distribution,
    })
}

/// Leaderboard of the query's top contents with column totals.
///
/// # Errors
///
/// Returns [`SearchError::NotFound`] when the query is missing or not the
/// user's.
pub async fn chart(
    store: &dyn SearchStore,
    user_id: i64,
    public_id: Uuid,
) -> Result<ChartData, SearchError> {
    let query = store
        .get_search_for_user(user_id, public_id)
        .await?
        .ok_or(SearchError::NotFound)?;
    let top = store
        .top_contents_for_search(query.id, CHART_TOP_CONTENTS)
        .await?;

    let mut totals = ChartTotals::default();
    let points = top
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            totals.likes = totals.likes.saturating_add(content.likes);
            totals.comments = totals.comments.saturating_add(content.comments);
            totals.shares = totals.shares.saturating_add(content.shares);
            totals.views = totals.views.saturating_add(content.views);
            totals.engagement_score = totals
                .engagement_score
                .saturating_add(content.engagement_score);

            ChartPoint {
                rank: format!("#{}", i + 1),
                label: chart_label(&content, i + 1),
                likes: content.likes,
                comments: content.comments,
                shares: content.shares,
                views: content.views,
                engagement_score: content.engagement_score,
                reactions: content.reactions,
            }
        })
        .collect();

    Ok(ChartData {
        search_id: query.public_id,
        points,
        totals,
    })
}

/// Caption cut to a short label, else the page name, else `"Post n"`.
fn chart_label(content: &Content, rank: usize) -> String {
    if let Some(caption) = content
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        return truncate_chars(caption, CHART_LABEL_CHARS);
    }
    content
        .page_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Post {rank}"))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 30), "short");
        assert_eq!(truncate_chars("ééééé", 3), "ééé...");
        assert_eq!(truncate_chars("word word word", 5), "word...");
    }
}
