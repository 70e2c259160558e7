//! Integration tests for `ApifyClient` against a wiremock actor API.

use std::time::Duration;

use serde_json::json;
use trendscout_core::Platform;
use trendscout_scraper::{ApifyClient, ContentSource, ScraperError, SourceRequest};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> ApifyClient {
    ApifyClient::with_base_url("test-token", base_url, 0, 0)
        .expect("client construction should not fail")
        .with_poll_interval(Duration::from_millis(1))
}

fn run_body(status: &str) -> serde_json::Value {
    json!({
        "data": {
            "id": "run-1",
            "status": status,
            "defaultDatasetId": "ds-1"
        }
    })
}

fn facebook_request() -> SourceRequest {
    SourceRequest {
        platform: Platform::Facebook,
        target_urls: vec!["https://www.facebook.com/ExamplePage".to_string()],
        max_results: 20,
    }
}

async fn mount_start(server: &MockServer, actor_path: &str) {
    Mock::given(method("POST"))
        .and(path(actor_path))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("READY")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_runs_actor_and_returns_dataset_items() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/KoJrdxJCTtpon81KY/runs"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "startUrls": [{ "url": "https://www.facebook.com/ExamplePage" }],
            "resultsLimit": 20
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("READY")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .and(query_param("waitForFinish", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("SUCCEEDED")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/datasets/ds-1/items"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "postId": "p1", "likes": 100 },
            { "postId": "p2", "likes": 50 }
        ])))
        .mount(&server)
        .await;

    let batch = test_client(&server.uri())
        .fetch(&facebook_request())
        .await
        .expect("fetch should succeed");

    assert_eq!(batch.run_id.as_deref(), Some("run-1"));
    assert_eq!(batch.items.len(), 2);
    assert_eq!(batch.items[0]["postId"], "p1");
}

#[tokio::test]
async fn wait_for_run_polls_until_terminal_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("RUNNING")))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("SUCCEEDED")))
        .mount(&server)
        .await;

    let run = test_client(&server.uri())
        .wait_for_run("run-1")
        .await
        .expect("run should finish");

    assert_eq!(run.status, "SUCCEEDED");
    assert_eq!(run.default_dataset_id, "ds-1");
}

#[tokio::test]
async fn failed_run_surfaces_run_failed() {
    let server = MockServer::start().await;
    mount_start(&server, "/acts/KoJrdxJCTtpon81KY/runs").await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("TIMED-OUT")))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .fetch(&facebook_request())
        .await
        .expect_err("a timed-out run is an error");

    match err {
        ScraperError::RunFailed { run_id, status } => {
            assert_eq!(run_id, "run-1");
            assert_eq!(status, "TIMED-OUT");
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_start_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/KoJrdxJCTtpon81KY/runs"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApifyClient::with_base_url("test-token", &server.uri(), 3, 0)
        .expect("client construction should not fail");
    let err = client
        .fetch(&facebook_request())
        .await
        .expect_err("401 is an error");

    assert!(
        matches!(err, ScraperError::Api { status: 401, ref message } if message == "invalid token"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datasets/ds-1/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/datasets/ds-1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "postId": "p1" }])))
        .mount(&server)
        .await;

    let client = ApifyClient::with_base_url("test-token", &server.uri(), 2, 0)
        .expect("client construction should not fail");
    let items = client
        .get_dataset_items("ds-1")
        .await
        .expect("retry should recover");

    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn instagram_uses_instagram_actor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/nH2AHrwxeTRJoN5hX/runs"))
        .and(body_partial_json(json!({
            "username": ["https://www.instagram.com/example/"],
            "resultsLimit": 5
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("SUCCEEDED")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("SUCCEEDED")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/datasets/ds-1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let batch = test_client(&server.uri())
        .fetch(&SourceRequest {
            platform: Platform::Instagram,
            target_urls: vec!["https://www.instagram.com/example/".to_string()],
            max_results: 5,
        })
        .await
        .expect("fetch should succeed");

    assert!(batch.items.is_empty());
}

#[tokio::test]
async fn non_array_dataset_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datasets/ds-1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "nope" })))
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .get_dataset_items("ds-1")
        .await
        .expect_err("object body is not a dataset");

    assert!(matches!(err, ScraperError::Deserialize { .. }));
}

#[tokio::test]
async fn start_run_is_not_retried_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/acts/KoJrdxJCTtpon81KY/runs"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApifyClient::with_base_url("test-token", &server.uri(), 3, 0)
        .expect("client construction should not fail");
    let err = client
        .fetch(&facebook_request())
        .await
        .expect_err("503 on start is an error");

    assert!(
        matches!(err, ScraperError::Api { status: 503, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn abandoned_fetch_aborts_its_run() {
    let server = MockServer::start().await;
    mount_start(&server, "/acts/KoJrdxJCTtpon81KY/runs").await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(run_body("RUNNING"))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/actor-runs/run-1/abort"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("ABORTED")))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let outcome =
        tokio::time::timeout(Duration::from_millis(200), client.fetch(&facebook_request())).await;
    assert!(outcome.is_err(), "fetch should still be polling");

    let mut aborted = false;
    for _ in 0..100 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests
            .iter()
            .any(|r| r.method.as_str() == "POST" && r.url.path() == "/actor-runs/run-1/abort")
        {
            aborted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(aborted, "run should be aborted once the fetch is dropped");
}

#[tokio::test]
async fn finished_run_is_not_aborted() {
    let server = MockServer::start().await;
    mount_start(&server, "/acts/KoJrdxJCTtpon81KY/runs").await;

    Mock::given(method("GET"))
        .and(path("/actor-runs/run-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("FAILED")))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/actor-runs/run-1/abort"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("ABORTED")))
        .expect(0)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .fetch(&facebook_request())
        .await
        .expect_err("failed run is an error");
    assert!(matches!(err, ScraperError::RunFailed { .. }));

    tokio::time::sleep(Duration::from_millis(50)).await;
}
