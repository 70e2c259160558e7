//! Keyword to target URL resolution.
//!
//! A keyword containing the platform's domain is used as a direct URL;
//! anything else is taken as a page name and expanded into the platform's
//! profile URL. The heuristic is best-effort: a page literally named
//! `"facebook.com fans"` resolves as a (broken) URL.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use trendscout_core::Platform;

static FACEBOOK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[^a-z0-9-])(facebook\.com|fb\.com|fb\.watch)\b")
        .expect("valid facebook marker regex")
});
static INSTAGRAM_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[^a-z0-9-])(instagram\.com|instagr\.am)\b")
        .expect("valid instagram marker regex")
});
static TIKTOK_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^|[^a-z0-9-])tiktok\.com\b").expect("valid tiktok marker regex")
});
static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("valid scheme regex"));

/// Characters escaped when a page name is placed in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn marker(platform: Platform) -> &'static Regex {
    match platform {
        Platform::Facebook => &*FACEBOOK_MARKER,
        Platform::Instagram => &*INSTAGRAM_MARKER,
        Platform::Tiktok => &*TIKTOK_MARKER,
    }
}

/// Returns `true` if `keyword` names a URL on `platform`'s domain.
#[must_use]
pub fn is_direct_url(keyword: &str, platform: Platform) -> bool {
    marker(platform).is_match(keyword)
}

/// Resolves a validated keyword to the URL handed to the content source.
#[must_use]
pub fn resolve_target(keyword: &str, platform: Platform) -> String {
    let keyword = keyword.trim();

    if is_direct_url(keyword, platform) {
        return if SCHEME.is_match(keyword) {
            keyword.to_string()
        } else {
            format!("https://{keyword}")
        };
    }

    let page = keyword.trim_start_matches('@').trim();
    let page = utf8_percent_encode(page, PATH_SEGMENT);
    match platform {
        Platform::Facebook => format!("https://www.facebook.com/{page}"),
        Platform::Instagram => format!("https://www.instagram.com/{page}/"),
        Platform::Tiktok => format!("https://www.tiktok.com/@{page}"),
    }
}
