//! Wire types for the Apify actor API and the raw post records its datasets
//! contain.
//!
//! Dataset items differ per actor and per platform. [`RawPost`] keeps every
//! field optional and carries each known spelling of a field separately, so
//! an item that only uses one spelling still decodes. Nothing outside
//! [`crate::normalize`] should read a `RawPost`.

use serde::{Deserialize, Serialize};

/// Envelope wrapping every Apify API response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Actor run metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub id: String,
    /// `READY`, `RUNNING`, `SUCCEEDED`, `FAILED`, `ABORTING`, `ABORTED`,
    /// `TIMING-OUT` or `TIMED-OUT`.
    pub status: String,
    pub default_dataset_id: String,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl RunData {
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status == "SUCCEEDED"
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_str(), "FAILED" | "ABORTED" | "TIMED-OUT")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUrl {
    pub url: String,
}

/// Input for the `apify/facebook-posts-scraper` actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacebookPostsInput {
    pub start_urls: Vec<StartUrl>,
    pub results_limit: u32,
}

/// Input for the `apify/instagram-post-scraper` actor. `username` accepts
/// profile URLs as well as bare handles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramPostsInput {
    pub username: Vec<String>,
    pub results_limit: u32,
}

/// Input for the `clockworks/tiktok-scraper` actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TiktokPostsInput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    #[serde(rename = "postURLs", skip_serializing_if = "Vec::is_empty")]
    pub post_urls: Vec<String>,
    pub results_per_page: u32,
}

/// A post identifier; actors emit both strings and bare numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    /// The identifier as text, or `None` when it is blank.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            RawId::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            RawId::Number(n) => Some(n.to_string()),
        }
    }
}

/// An interaction counter as emitted by the actor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Int(i64),
    Float(f64),
    Text(#[serde(deserialize_with = "count_from_text")] i64),
}

impl RawCount {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn value(self) -> i64 {
        match self {
            RawCount::Int(n) | RawCount::Text(n) => n,
            RawCount::Float(f) if f.is_finite() => f.trunc() as i64,
            RawCount::Float(_) => 0,
        }
    }
}

fn count_from_text<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // "1,204" -> 1204; text with no digits counts as zero.
    let raw = String::deserialize(deserializer)?;
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    Ok(digits.parse::<i64>().unwrap_or(0))
}

/// A post timestamp: Unix seconds, or an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Seconds(i64),
    Fractional(f64),
    Text(String),
}

/// Author block emitted by the Facebook (`user`) and TikTok (`authorMeta`)
/// actors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAuthor {
    pub name: Option<String>,
    pub profile_url: Option<String>,
}

/// One dataset item, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub post_id: Option<RawId>,
    pub id: Option<RawId>,
    pub url: Option<String>,
    pub web_video_url: Option<String>,

    pub text: Option<String>,
    pub caption: Option<String>,

    pub timestamp: Option<RawTimestamp>,
    pub create_time: Option<i64>,

    pub likes: Option<RawCount>,
    pub likes_count: Option<RawCount>,
    pub digg_count: Option<RawCount>,
    pub comments: Option<RawCount>,
    pub comments_count: Option<RawCount>,
    pub comment_count: Option<RawCount>,
    pub shares: Option<RawCount>,
    pub share_count: Option<RawCount>,
    pub views_count: Option<RawCount>,
    pub video_view_count: Option<RawCount>,
    pub play_count: Option<RawCount>,

    pub media: Option<Vec<serde_json::Value>>,
    pub images: Option<Vec<String>>,
    pub display_url: Option<String>,
    pub video_url: Option<String>,

    pub page_name: Option<String>,
    pub owner_username: Option<String>,
    pub page_url: Option<String>,
    pub facebook_url: Option<String>,
    pub user: Option<RawAuthor>,
    pub author_meta: Option<RawAuthor>,

    pub reactions: Option<serde_json::Value>,
}

impl RawPost {
    /// Decodes one dataset item.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when a present field has a shape no
    /// actor is known to emit (for example an object where a count belongs).
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_post_decodes_facebook_item() {
        let raw = RawPost::from_value(serde_json::json!({
            "postId": "1234567890",
            "url": "https://www.facebook.com/ExamplePage/posts/1234567890",
            "text": "hello",
            "timestamp": 1_700_000_000,
            "likes": 100,
            "comments": 10,
            "shares": 5,
            "pageName": "ExamplePage",
            "user": { "name": "Example Page", "profileUrl": "https://www.facebook.com/ExamplePage" },
            "reactions": { "like": 90, "love": 10 }
        }))
        .expect("facebook item decodes");

        assert_eq!(raw.post_id, Some(RawId::Text("1234567890".into())));
        assert_eq!(raw.likes.map(RawCount::value), Some(100));
        assert_eq!(raw.timestamp, Some(RawTimestamp::Seconds(1_700_000_000)));
        assert_eq!(
            raw.user.and_then(|u| u.profile_url).as_deref(),
            Some("https://www.facebook.com/ExamplePage")
        );
    }

    #[test]
    fn raw_post_decodes_tiktok_item_with_numeric_id() {
        let raw = RawPost::from_value(serde_json::json!({
            "id": 7_301_234_567_890_i64,
            "webVideoUrl": "https://www.tiktok.com/@example/video/7301234567890",
            "createTime": 1_700_000_000,
            "diggCount": 12.0,
            "commentCount": "1,204",
            "playCount": 5000,
            "authorMeta": { "name": "example" }
        }))
        .expect("tiktok item decodes");

        assert_eq!(raw.id, Some(RawId::Number(7_301_234_567_890)));
        assert_eq!(raw.digg_count.map(RawCount::value), Some(12));
        assert_eq!(raw.comment_count.map(RawCount::value), Some(1204));
        assert_eq!(raw.create_time, Some(1_700_000_000));
    }

    #[test]
    fn raw_post_rejects_object_where_count_belongs() {
        let err = RawPost::from_value(serde_json::json!({
            "url": "https://www.instagram.com/p/abc/",
            "likesCount": { "total": 3 }
        }));
        assert!(err.is_err());
    }

    #[test]
    fn blank_text_id_is_absent() {
        assert_eq!(RawId::Text("   ".into()).into_text(), None);
        assert_eq!(RawId::Number(42).into_text().as_deref(), Some("42"));
    }

    #[test]
    fn run_data_terminal_statuses() {
        let run = |status: &str| RunData {
            id: "run".into(),
            status: status.into(),
            default_dataset_id: "ds".into(),
            status_message: None,
        };
        assert!(run("SUCCEEDED").is_succeeded());
        assert!(run("TIMED-OUT").is_failed());
        assert!(run("ABORTED").is_failed());
        assert!(!run("RUNNING").is_failed());
        assert!(!run("RUNNING").is_succeeded());
    }
}
