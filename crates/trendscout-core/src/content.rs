use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::Platform;

/// Engagement score used for ranking: `likes + comments + shares`.
///
/// Views are deliberately not part of the score.
#[must_use]
pub fn engagement_score(likes: i64, comments: i64, shares: i64) -> i64 {
    likes.saturating_add(comments).saturating_add(shares)
}

/// A post scraped from a content source, normalized and ready to be
/// reconciled against the stored contents of one search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    /// Natural key within a search query: the platform post id, or the post
    /// URL when the source provides no id.
    pub external_id: String,
    pub platform: Platform,
    pub url: Option<String>,
    pub caption: Option<String>,
    pub media_urls: Vec<String>,
    pub page_name: Option<String>,
    pub page_url: Option<String>,
    /// Unset when the source did not report a timestamp.
    pub posted_at: Option<DateTime<Utc>>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
    pub engagement_score: i64,
    /// Reaction breakdown exactly as the source reported it.
    pub reactions: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_score_sums_interactions() {
        assert_eq!(engagement_score(100, 10, 5), 115);
        assert_eq!(engagement_score(50, 5, 2), 57);
        assert_eq!(engagement_score(10, 1, 0), 11);
        assert_eq!(engagement_score(0, 0, 0), 0);
    }

    #[test]
    fn engagement_score_saturates_instead_of_overflowing() {
        assert_eq!(engagement_score(i64::MAX, 1, 1), i64::MAX);
    }
}
