//! Normalization from raw dataset items to [`trendscout_core::ContentDraft`].

use chrono::{DateTime, Utc};
use trendscout_core::{engagement_score, ContentDraft, Platform};

use crate::types::{RawAuthor, RawCount, RawPost, RawTimestamp};

/// Decodes and normalizes a batch of dataset items, preserving their order.
///
/// An item that fails to decode, or that carries neither an identifier nor a
/// URL, is skipped with a log line; it never aborts the rest of the batch.
#[must_use]
pub fn normalize_batch(items: Vec<serde_json::Value>, platform: Platform) -> Vec<ContentDraft> {
    let total = items.len();
    let mut drafts = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        let raw = match RawPost::from_value(item) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(index, %platform, error = %e, "skipping undecodable dataset item");
                continue;
            }
        };
        match normalize_post(raw, platform) {
            Some(draft) => drafts.push(draft),
            None => {
                tracing::debug!(index, %platform, "skipping dataset item without id or url");
            }
        }
    }

    if drafts.len() < total {
        tracing::info!(
            %platform,
            total,
            accepted = drafts.len(),
            "dropped dataset items during normalization"
        );
    }

    drafts
}

/// Normalizes one [`RawPost`].
///
/// Returns `None` when the record has no usable natural key: neither a post
/// identifier nor a URL. The key is the identifier when present, the URL
/// otherwise.
#[must_use]
pub fn normalize_post(raw: RawPost, platform: Platform) -> Option<ContentDraft> {
    let url = non_blank(raw.url).or_else(|| non_blank(raw.web_video_url));
    let post_id = raw
        .post_id
        .and_then(crate::types::RawId::into_text)
        .or_else(|| raw.id.and_then(crate::types::RawId::into_text));
    let external_id = post_id.or_else(|| url.clone())?;

    let likes = first_count(&[raw.likes, raw.likes_count, raw.digg_count]);
    let comments = first_count(&[raw.comments, raw.comments_count, raw.comment_count]);
    let shares = first_count(&[raw.shares, raw.share_count]);
    let views = first_count(&[raw.views_count, raw.video_view_count, raw.play_count]);

    let posted_at = match raw.timestamp {
        Some(ts) => timestamp_to_datetime(&ts),
        None => raw.create_time.and_then(|s| DateTime::from_timestamp(s, 0)),
    };

    let media_urls = collect_media_urls(
        raw.media.as_deref().unwrap_or_default(),
        raw.images.as_deref().unwrap_or_default(),
        [raw.display_url.as_deref(), raw.video_url.as_deref()],
    );

    let author = raw.user.or(raw.author_meta).unwrap_or_default();
    let RawAuthor {
        name: author_name,
        profile_url: author_url,
    } = author;

    Some(ContentDraft {
        external_id,
        platform,
        url,
        caption: non_blank(raw.text).or_else(|| non_blank(raw.caption)),
        media_urls,
        page_name: non_blank(raw.page_name)
            .or_else(|| non_blank(raw.owner_username))
            .or_else(|| non_blank(author_name)),
        page_url: non_blank(raw.page_url)
            .or_else(|| non_blank(raw.facebook_url))
            .or_else(|| non_blank(author_url)),
        posted_at,
        likes,
        comments,
        shares,
        views,
        engagement_score: engagement_score(likes, comments, shares),
        reactions: raw.reactions.filter(|r| !r.is_null()),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// First present counter, clamped at zero. Absent counters read as zero.
fn first_count(candidates: &[Option<RawCount>]) -> i64 {
    candidates
        .iter()
        .flatten()
        .next()
        .map_or(0, |c| c.value().max(0))
}

/// Unix seconds become an absolute time; text is tried as RFC 3339 and then
/// as a decimal seconds value. Anything unparseable leaves the time unset.
#[allow(clippy::cast_possible_truncation)]
fn timestamp_to_datetime(ts: &RawTimestamp) -> Option<DateTime<Utc>> {
    match ts {
        RawTimestamp::Seconds(secs) => DateTime::from_timestamp(*secs, 0),
        RawTimestamp::Fractional(secs) if secs.is_finite() => {
            DateTime::from_timestamp(secs.trunc() as i64, 0)
        }
        RawTimestamp::Fractional(_) => None,
        RawTimestamp::Text(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    text.parse::<i64>()
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0))
                })
        }
    }
}

/// Gathers media URLs in source order, without duplicates.
fn collect_media_urls<'a>(
    media: &'a [serde_json::Value],
    images: &'a [String],
    singles: [Option<&'a str>; 2],
) -> Vec<String> {
    let from_media = media.iter().filter_map(media_item_url);
    let from_images = images.iter().map(String::as_str);
    let from_singles = singles.into_iter().flatten();

    let mut urls: Vec<String> = Vec::new();
    for url in from_media.chain(from_images).chain(from_singles) {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// A `media` entry is either a bare URL string or an object carrying one.
fn media_item_url(item: &serde_json::Value) -> Option<&str> {
    if let Some(url) = item.as_str() {
        return Some(url);
    }
    ["thumbnail", "url", "image"]
        .iter()
        .find_map(|key| item.get(key).and_then(serde_json::Value::as_str))
        .or_else(|| {
            item.get("photo_image")
                .and_then(|p| p.get("uri"))
                .and_then(serde_json::Value::as_str)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawPost {
        RawPost::from_value(value).expect("fixture decodes")
    }

    #[test]
    fn normalize_post_computes_unweighted_score() {
        let draft = normalize_post(
            raw(json!({
                "postId": "p1",
                "url": "https://www.facebook.com/ExamplePage/posts/p1",
                "likes": 100,
                "comments": 10,
                "shares": 5,
                "viewsCount": 9000
            })),
            Platform::Facebook,
        )
        .expect("draft");

        assert_eq!(draft.external_id, "p1");
        assert_eq!(draft.engagement_score, 115);
        assert_eq!(draft.views, 9000);
    }

    #[test]
    fn normalize_post_falls_back_to_url_as_key() {
        let draft = normalize_post(
            raw(json!({ "url": "https://www.instagram.com/p/abc/" })),
            Platform::Instagram,
        )
        .expect("draft");
        assert_eq!(draft.external_id, "https://www.instagram.com/p/abc/");
        assert_eq!(draft.url.as_deref(), Some("https://www.instagram.com/p/abc/"));
    }

    #[test]
    fn normalize_post_skips_record_without_id_or_url() {
        let draft = normalize_post(
            raw(json!({ "text": "orphan", "likes": 3, "postId": "  " })),
            Platform::Facebook,
        );
        assert!(draft.is_none());
    }

    #[test]
    fn missing_counters_default_to_zero_and_negatives_clamp() {
        let draft = normalize_post(
            raw(json!({ "postId": "p", "likes": -4 })),
            Platform::Facebook,
        )
        .expect("draft");
        assert_eq!(
            (draft.likes, draft.comments, draft.shares, draft.views),
            (0, 0, 0, 0)
        );
        assert_eq!(draft.engagement_score, 0);
    }

    #[test]
    fn unix_seconds_become_post_time_and_absence_stays_unset() {
        let with_time = normalize_post(
            raw(json!({ "postId": "p", "timestamp": 1_700_000_000 })),
            Platform::Facebook,
        )
        .expect("draft");
        assert_eq!(
            with_time.posted_at,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );

        let without_time =
            normalize_post(raw(json!({ "postId": "p" })), Platform::Facebook).expect("draft");
        assert!(without_time.posted_at.is_none());
    }

    #[test]
    fn rfc3339_timestamp_text_is_accepted() {
        let draft = normalize_post(
            raw(json!({ "postId": "p", "timestamp": "2024-05-01T12:00:00.000Z" })),
            Platform::Instagram,
        )
        .expect("draft");
        assert_eq!(
            draft.posted_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn tiktok_fields_map_onto_draft() {
        let draft = normalize_post(
            raw(json!({
                "id": "7301",
                "webVideoUrl": "https://www.tiktok.com/@example/video/7301",
                "createTime": 1_700_000_000,
                "diggCount": 50,
                "commentCount": 5,
                "shareCount": 2,
                "playCount": 1000,
                "authorMeta": { "name": "example", "profileUrl": "https://www.tiktok.com/@example" }
            })),
            Platform::Tiktok,
        )
        .expect("draft");

        assert_eq!(draft.external_id, "7301");
        assert_eq!(draft.engagement_score, 57);
        assert_eq!(draft.page_name.as_deref(), Some("example"));
        assert_eq!(draft.page_url.as_deref(), Some("https://www.tiktok.com/@example"));
        assert!(draft.posted_at.is_some());
    }

    #[test]
    fn media_urls_are_collected_in_order_without_duplicates() {
        let draft = normalize_post(
            raw(json!({
                "postId": "p",
                "media": [
                    { "thumbnail": "https://cdn.example.com/1.jpg" },
                    "https://cdn.example.com/2.jpg",
                    { "photo_image": { "uri": "https://cdn.example.com/3.jpg" } }
                ],
                "images": ["https://cdn.example.com/2.jpg"],
                "displayUrl": "https://cdn.example.com/4.jpg"
            })),
            Platform::Facebook,
        )
        .expect("draft");

        assert_eq!(
            draft.media_urls,
            vec![
                "https://cdn.example.com/1.jpg",
                "https://cdn.example.com/2.jpg",
                "https://cdn.example.com/3.jpg",
                "https://cdn.example.com/4.jpg",
            ]
        );
    }

    #[test]
    fn reactions_are_carried_opaquely() {
        let draft = normalize_post(
            raw(json!({ "postId": "p", "reactions": { "like": 3, "wow": 1 } })),
            Platform::Facebook,
        )
        .expect("draft");
        assert_eq!(draft.reactions, Some(json!({ "like": 3, "wow": 1 })));
    }

    #[test]
    fn normalize_batch_skips_bad_items_and_keeps_order() {
        let drafts = normalize_batch(
            vec![
                json!({ "postId": "a", "likes": 1 }),
                json!({ "text": "no key" }),
                json!({ "postId": "b", "likes": { "bad": true } }),
                json!("not an object"),
                json!({ "postId": "c", "likes": 3 }),
            ],
            Platform::Facebook,
        );

        let ids: Vec<&str> = drafts.iter().map(|d| d.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
