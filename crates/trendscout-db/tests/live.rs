//! Live integration tests for trendscout-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. They are ignored by default; run them with
//! `cargo test -p trendscout-db -- --ignored` and `DATABASE_URL` pointing at a
//! disposable server.

use chrono::{Duration, TimeZone, Utc};
use trendscout_core::{engagement_score, ContentDraft, Platform};
use trendscout_db::{
    complete_search_query, count_contents_for_user, create_search_query, fail_search_query,
    fail_stale_search_queries, find_or_create_user, get_search_query,
    get_search_query_for_user, increment_searches_used, list_contents_for_query,
    list_platform_distribution_for_user, list_top_contents_for_user, refresh_quota_period,
    start_search_query, update_user_profile, DbError, NewSearchQuery,
};

async fn insert_user(pool: &sqlx::PgPool, external_id: &str) -> i64 {
    find_or_create_user(
        pool,
        external_id,
        &format!("{external_id}@example.com"),
        None,
        "FREE",
        10,
    )
    .await
    .unwrap_or_else(|e| panic!("insert_user failed for '{external_id}': {e}"))
    .id
}

async fn insert_query(pool: &sqlx::PgPool, user_id: i64, platform: &str) -> i64 {
    create_search_query(
        pool,
        NewSearchQuery {
            user_id,
            keyword: "ExamplePage",
            platform,
            target_url: "https://www.facebook.com/ExamplePage",
            max_results: 20,
        },
    )
    .await
    .expect("create_search_query")
    .id
}

fn draft(external_id: &str, likes: i64, comments: i64, shares: i64) -> ContentDraft {
    ContentDraft {
        external_id: external_id.to_string(),
        platform: Platform::Facebook,
        url: Some(format!("https://www.facebook.com/ExamplePage/posts/{external_id}")),
        caption: Some("hello".to_string()),
        media_urls: vec!["https://cdn.example.com/a.jpg".to_string()],
        page_name: Some("ExamplePage".to_string()),
        page_url: Some("https://www.facebook.com/ExamplePage".to_string()),
        posted_at: None,
        likes,
        comments,
        shares,
        views: 0,
        engagement_score: engagement_score(likes, comments, shares),
        reactions: Some(serde_json::json!({"like": likes})),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn find_or_create_user_is_idempotent(pool: sqlx::PgPool) {
    let first = find_or_create_user(&pool, "idp|1", "a@example.com", None, "FREE", 10)
        .await
        .expect("first");
    let second = find_or_create_user(&pool, "idp|1", "other@example.com", Some("X"), "PRO", 500)
        .await
        .expect("second");

    assert_eq!(first.id, second.id);
    assert_eq!(second.email, "a@example.com");
    assert_eq!(second.plan_tier, "FREE");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn refresh_quota_period_resets_on_month_rollover(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "idp|quota").await;
    sqlx::query(
        "UPDATE users SET searches_used = 10, quota_reset_date = $2 WHERE id = $1",
    )
    .bind(user_id)
    .bind(Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap())
    .execute(&pool)
    .await
    .expect("seed usage");

    let same_month = Utc.with_ymd_and_hms(2026, 1, 31, 23, 0, 0).unwrap();
    let kept = refresh_quota_period(&pool, user_id, same_month)
        .await
        .expect("refresh")
        .expect("user exists");
    assert!(!kept.was_reset);
    assert_eq!(kept.searches_used, 10);

    let next_month = Utc.with_ymd_and_hms(2026, 2, 1, 0, 5, 0).unwrap();
    let rolled = refresh_quota_period(&pool, user_id, next_month)
        .await
        .expect("refresh")
        .expect("user exists");
    assert!(rolled.was_reset);
    assert_eq!(rolled.searches_used, 0);
    assert_eq!(rolled.quota_reset_date, next_month);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn refresh_quota_period_returns_none_for_unknown_user(pool: sqlx::PgPool) {
    let result = refresh_quota_period(&pool, 9_999, Utc::now())
        .await
        .expect("refresh");
    assert!(result.is_none());
    assert!(matches!(
        increment_searches_used(&pool, 9_999).await,
        Err(DbError::NotFound)
    ));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn search_query_lifecycle_is_one_directional(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "idp|life").await;
    let id = insert_query(&pool, user_id, "FACEBOOK").await;

    assert!(matches!(
        complete_search_query(&pool, id, 3, Some("run-1")).await,
        Err(DbError::InvalidSearchTransition { .. })
    ));

    start_search_query(&pool, id).await.expect("start");
    assert!(matches!(
        start_search_query(&pool, id).await,
        Err(DbError::InvalidSearchTransition { .. })
    ));

    complete_search_query(&pool, id, 3, Some("run-1"))
        .await
        .expect("complete");
    assert!(matches!(
        fail_search_query(&pool, id, "late").await,
        Err(DbError::InvalidSearchTransition { .. })
    ));

    let row = get_search_query(&pool, id).await.expect("get").expect("row");
    assert_eq!(row.status, "COMPLETED");
    assert_eq!(row.result_count, Some(3));
    assert_eq!(row.external_run_id.as_deref(), Some("run-1"));
    assert!(row.error_message.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn get_search_query_for_user_hides_foreign_queries(pool: sqlx::PgPool) {
    let owner = insert_user(&pool, "idp|owner").await;
    let intruder = insert_user(&pool, "idp|intruder").await;
    let id = insert_query(&pool, owner, "FACEBOOK").await;
    let public_id = get_search_query(&pool, id)
        .await
        .expect("get")
        .expect("row")
        .public_id;

    assert!(get_search_query_for_user(&pool, owner, public_id)
        .await
        .expect("owner lookup")
        .is_some());
    assert!(get_search_query_for_user(&pool, intruder, public_id)
        .await
        .expect("intruder lookup")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn upsert_content_updates_counters_in_place(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "idp|upsert").await;
    let query_id = insert_query(&pool, user_id, "FACEBOOK").await;

    let first = trendscout_db::upsert_content(&pool, query_id, &draft("p1", 1, 1, 1))
        .await
        .expect("first upsert");
    let mut updated = draft("p1", 100, 10, 5);
    updated.caption = Some("edited caption".to_string());
    let second = trendscout_db::upsert_content(&pool, query_id, &updated)
        .await
        .expect("second upsert");

    assert_eq!(first.id, second.id);
    assert_eq!(second.engagement_score, 115);
    assert_eq!(second.caption.as_deref(), Some("hello"));
    assert_eq!(second.reactions, Some(serde_json::json!({"like": 100})));

    let rows = list_contents_for_query(&pool, query_id).await.expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(count_contents_for_user(&pool, user_id).await.expect("count"), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn dashboard_reads_are_scoped_to_owner(pool: sqlx::PgPool) {
    let alice = insert_user(&pool, "idp|alice").await;
    let bob = insert_user(&pool, "idp|bob").await;
    let alice_q = insert_query(&pool, alice, "FACEBOOK").await;
    let bob_q = insert_query(&pool, bob, "TIKTOK").await;

    trendscout_db::upsert_content(&pool, alice_q, &draft("a1", 5, 0, 0))
        .await
        .expect("alice content");
    trendscout_db::upsert_content(&pool, bob_q, &draft("b1", 500, 0, 0))
        .await
        .expect("bob content");

    let top = list_top_contents_for_user(&pool, alice, 10).await.expect("top");
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].external_id, "a1");

    let dist = list_platform_distribution_for_user(&pool, alice)
        .await
        .expect("distribution");
    assert_eq!(dist.len(), 1);
    assert_eq!(dist[0].platform, "FACEBOOK");
    assert_eq!(dist[0].search_count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn fail_stale_search_queries_only_touches_old_open_queries(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "idp|stale").await;
    let old = insert_query(&pool, user_id, "FACEBOOK").await;
    let fresh = insert_query(&pool, user_id, "FACEBOOK").await;
    sqlx::query("UPDATE search_queries SET created_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
        .bind(old)
        .execute(&pool)
        .await
        .expect("age query");

    let failed = fail_stale_search_queries(&pool, Utc::now() - Duration::minutes(30), "abandoned")
        .await
        .expect("sweep");
    assert_eq!(failed, 1);

    let old_row = get_search_query(&pool, old).await.expect("get").expect("row");
    let fresh_row = get_search_query(&pool, fresh).await.expect("get").expect("row");
    assert_eq!(old_row.status, "FAILED");
    assert_eq!(old_row.error_message.as_deref(), Some("abandoned"));
    assert_eq!(fresh_row.status, "PENDING");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a disposable Postgres via DATABASE_URL"]
async fn update_user_profile_keeps_unspecified_fields(pool: sqlx::PgPool) {
    let user_id = insert_user(&pool, "idp|profile").await;
    let row = update_user_profile(&pool, user_id, None, Some("Dana"))
        .await
        .expect("update");
    assert_eq!(row.email, "idp|profile@example.com");
    assert_eq!(row.display_name.as_deref(), Some("Dana"));
}
