// tests/sources_usajobs.rs
//
// USAJobs client against a local wiremock server: auth headers, query
// names, cache hits, TTL expiry and failure handling.

use std::fs;
use std::time::Duration;

use remote_jobs_aggregator::config::SourceConfig;
use remote_jobs_aggregator::sources::error::SourceError;
use remote_jobs_aggregator::sources::providers::usajobs::{UsaJobsClient, UsaJobsParams};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture() -> String {
    fs::read_to_string("tests/fixtures/usajobs.json").expect("missing tests/fixtures/usajobs.json")
}

fn config(server: &MockServer, ttl_secs: u64) -> SourceConfig {
    SourceConfig {
        base_url: format!("{}/api/search", server.uri()),
        ttl_secs,
        timeout_secs: 2,
        user_agent: "jobs-test@example.org".into(),
        api_key: Some("test-key".into()),
        ..SourceConfig::usajobs_default()
    }
}

fn rust_query() -> UsaJobsParams {
    UsaJobsParams {
        keyword: Some("rust".into()),
        results_per_page: Some(25),
        ..Default::default()
    }
}

#[tokio::test]
async fn sends_auth_headers_and_pascal_case_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(header("authorization-key", "test-key"))
        .and(header("user-agent", "jobs-test@example.org"))
        .and(query_param("Keyword", "rust"))
        .and(query_param("ResultsPerPage", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
        .expect(1)
        .mount(&server)
        .await;

    let client = UsaJobsClient::new(&config(&server, 600)).unwrap();
    let resp = client.try_search(&rust_query()).await.expect("search ok");

    assert_eq!(resp.count, 2);
    assert_eq!(resp.jobs.len(), 2);
    assert_eq!(resp.jobs[0].id, "781234500");
    assert!(resp.jobs[0].remote);
    assert_eq!(resp.jobs[1].id, "781234777");
    assert!(!resp.jobs[1].remote);
    // empty ApplyURI falls back to the position page
    assert_eq!(resp.jobs[1].apply_url, "https://www.usajobs.gov/job/781234777");
}

#[tokio::test]
async fn second_identical_search_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
        .expect(1)
        .mount(&server)
        .await;

    let client = UsaJobsClient::new(&config(&server, 600)).unwrap();
    let first = client.search(&rust_query()).await;

    // same logical parameters, built in a different order
    let mut again = UsaJobsParams {
        results_per_page: Some(25),
        ..Default::default()
    };
    again.keyword = Some("rust".into());
    let second = client.search(&again).await;

    assert_eq!(first, second);
    assert_eq!(client.cache_len(), 1);
}

#[tokio::test]
async fn expired_entry_triggers_a_new_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
        .expect(2)
        .mount(&server)
        .await;

    // zero TTL: every entry is already stale when read back
    let client = UsaJobsClient::new(&config(&server, 0)).unwrap();
    client.search(&rust_query()).await;
    client.search(&rust_query()).await;
}

#[tokio::test]
async fn http_error_yields_empty_response_and_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = UsaJobsClient::new(&config(&server, 600)).unwrap();

    let err = client.try_search(&rust_query()).await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 500, .. }));

    let resp = client.search(&rust_query()).await;
    assert!(resp.jobs.is_empty());
    assert_eq!(resp.count, 0);
    assert_eq!(client.cache_len(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = UsaJobsClient::new(&config(&server, 600)).unwrap();
    let err = client.try_search(&rust_query()).await.unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(fixture())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut cfg = config(&server, 600);
    cfg.timeout_secs = 1;
    let client = UsaJobsClient::new(&cfg).unwrap();
    let err = client.try_search(&rust_query()).await.unwrap_err();
    assert_eq!(err.kind(), "timeout");
}
