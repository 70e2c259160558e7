//! Result reconciliation: upsert a batch of drafts under one query, then rank.

use trendscout_core::ContentDraft;

use crate::model::Content;
use crate::store::SearchStore;

/// Upserts `drafts` under `search_query_id` in the order given and returns
/// the accepted rows ranked by engagement score, descending.
///
/// A draft the store refuses is logged and skipped. A draft repeating an
/// earlier external id in the same batch updates that row; the returned list
/// holds it once, at its first position, with the latest counters. Equal
/// scores keep their order of first acceptance.
pub async fn reconcile(
    store: &dyn SearchStore,
    search_query_id: i64,
    drafts: Vec<ContentDraft>,
) -> Vec<Content> {
    let mut accepted: Vec<Content> = Vec::with_capacity(drafts.len());

    for draft in drafts {
        match store.upsert_content(search_query_id, &draft).await {
            Ok(content) => {
                if let Some(slot) = accepted.iter_mut().find(|c| c.id == content.id) {
                    *slot = content;
                } else {
                    accepted.push(content);
                }
            }
            Err(e) => {
                tracing::warn!(
                    search_query_id,
                    external_id = %draft.external_id,
                    error = %e,
                    "skipping content that failed to persist"
                );
            }
        }
    }

    // sort_by is stable: equal scores stay in acceptance order.
    accepted.sort_by(|a, b| b.engagement_score.cmp(&a.engagement_score));
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::model::NewSearch;
    use trendscout_core::{engagement_score, PlanTier, Platform};

    fn draft(id: &str, likes: i64, comments: i64, shares: i64) -> ContentDraft {
        ContentDraft {
            external_id: id.to_string(),
            platform: Platform::Facebook,
            url: None,
            caption: None,
            media_urls: Vec::new(),
            page_name: None,
            page_url: None,
            posted_at: None,
            likes,
            comments,
            shares,
            views: 0,
            engagement_score: engagement_score(likes, comments, shares),
            reactions: None,
        }
    }

    async fn store_with_search() -> (MemoryStore, i64) {
        let store = MemoryStore::new();
        let user = store
            .find_or_create_user("idp|r", "r@example.com", None, PlanTier::Free)
            .await
            .expect("user");
        let search = store
            .create_search(NewSearch {
                user_id: user.id,
                keyword: "k".to_string(),
                platform: Platform::Facebook,
                target_url: "https://www.facebook.com/k".to_string(),
                max_results: 20,
            })
            .await
            .expect("search");
        (store, search.id)
    }

    #[tokio::test]
    async fn equal_scores_keep_input_order() {
        let (store, id) = store_with_search().await;
        let ranked = reconcile(
            &store,
            id,
            vec![
                draft("low", 1, 0, 0),
                draft("tie-a", 5, 0, 0),
                draft("high", 9, 0, 0),
                draft("tie-b", 4, 1, 0),
            ],
        )
        .await;

        let ids: Vec<&str> = ranked.iter().map(|c| c.external_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "tie-a", "tie-b", "low"]);
    }

    #[tokio::test]
    async fn duplicate_in_batch_is_returned_once_with_latest_counters() {
        let (store, id) = store_with_search().await;
        let ranked = reconcile(
            &store,
            id,
            vec![draft("p", 1, 0, 0), draft("q", 3, 0, 0), draft("p", 10, 0, 0)],
        )
        .await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].external_id, "p");
        assert_eq!(ranked[0].engagement_score, 10);
    }

    #[tokio::test]
    async fn rejected_draft_is_skipped() {
        let (store, id) = store_with_search().await;
        let mut bad = draft("bad", 100, 0, 0);
        bad.caption = Some("nul\0".to_string());

        let ranked = reconcile(&store, id, vec![draft("a", 1, 0, 0), bad, draft("b", 2, 0, 0)]).await;

        let ids: Vec<&str> = ranked.iter().map(|c| c.external_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
