//! HTTP probe scenarios against wiremock stubs and dead listeners.

mod common;

use common::fixtures::*;
use serde_json::json;
use webmond::probes;
use webmond::{CryptoBox, Monitor, MonitorSpec, MonitorStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crypto() -> CryptoBox {
    CryptoBox::from_base64_key(&CryptoBox::generate_key_b64()).unwrap()
}

fn monitor_for(url: &str) -> Monitor {
    url_monitor("space-1", "web", url)
}

#[tokio::test]
async fn connection_refused_fails_only_the_connection_check() {
    let url = format!("http://127.0.0.1:{}/notlisten", dead_port());
    let monitor = monitor_for(&url);

    let result = probes::run_probe(&monitor, &crypto()).await;

    assert_eq!(result.status, MonitorStatus::Unhealthy);
    assert_eq!(result.failed_checks, 1);
    assert_eq!(result.check_list, vec!["connection", "status_code"]);
    assert_eq!(result.details["connection"]["connected"], false);
    assert_eq!(
        result.details["connection"]["message"],
        "Failed to establish connection"
    );
    // Downstream checks were not attempted
    assert!(result.details.get("status_code").is_none());
}

#[tokio::test]
async fn healthy_endpoint_with_content_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
        .mount(&server)
        .await;

    let mut monitor = monitor_for(&server.uri());
    if let MonitorSpec::Url(spec) = &mut monitor.spec {
        spec.check_content = Some("hello".to_string());
    }

    let result = probes::run_probe(&monitor, &crypto()).await;

    assert_eq!(result.status, MonitorStatus::Healthy);
    assert_eq!(result.failed_checks, 0);
    assert_eq!(result.check_list, vec!["connection", "status_code", "content"]);
    assert_eq!(result.details["connection"]["connected"], true);
    assert_eq!(result.details["status_code"]["actual"], 200);
    assert_eq!(result.details["content"]["found"], true);
    assert!(result.response_time_ms >= 0.0);
}

#[tokio::test]
async fn unexpected_status_code_fails_that_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let monitor = monitor_for(&server.uri());
    let result = probes::run_probe(&monitor, &crypto()).await;

    assert_eq!(result.status, MonitorStatus::Unhealthy);
    assert_eq!(result.failed_checks, 1);
    assert_eq!(result.details["connection"]["connected"], true);
    assert_eq!(result.details["status_code"]["expected"], 200);
    assert_eq!(result.details["status_code"]["actual"], 500);
    assert_eq!(
        result.details["status_code"]["message"],
        "Expected status code 200, got 500"
    );
}

#[tokio::test]
async fn missing_content_fails_the_content_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("nothing to see"))
        .mount(&server)
        .await;

    let mut monitor = monitor_for(&server.uri());
    if let MonitorSpec::Url(spec) = &mut monitor.spec {
        spec.check_content = Some("hello".to_string());
    }

    let result = probes::run_probe(&monitor, &crypto()).await;

    assert_eq!(result.status, MonitorStatus::Unhealthy);
    assert_eq!(result.failed_checks, 1);
    assert_eq!(result.details["content"]["found"], false);
    assert_eq!(
        result.details["content"]["message"],
        "Required content not found in response"
    );
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    // timeout_seconds is 1 in the fixture
    let monitor = monitor_for(&server.uri());
    let result = probes::run_probe(&monitor, &crypto()).await;

    assert_eq!(result.status, MonitorStatus::Unhealthy);
    assert_eq!(result.failed_checks, 1);
    assert_eq!(result.details["connection"]["connected"], false);
    assert_eq!(
        result.details["connection"]["message"],
        "Request timed out after 1 seconds"
    );
}

#[tokio::test]
async fn ssl_check_fails_against_plain_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut monitor = monitor_for(&server.uri());
    if let MonitorSpec::Url(spec) = &mut monitor.spec {
        spec.check_ssl = true;
        spec.timeout_seconds = 5;
    }

    let result = probes::run_probe(&monitor, &crypto()).await;

    // The GET succeeds but the TLS handshake against the HTTP port cannot
    assert_eq!(result.status, MonitorStatus::Unhealthy);
    assert_eq!(result.failed_checks, 1);
    assert_eq!(
        result.check_list,
        vec!["connection", "status_code", "ssl"]
    );
    assert_eq!(result.details["connection"]["connected"], true);
    assert_eq!(result.details["ssl"]["message"], "SSL/TLS verification failed");
    assert!(result.details["ssl"]["error"].is_string());
}

#[tokio::test]
async fn redirects_honour_the_follow_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/from"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/to"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/to"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = format!("{}/from", server.uri());

    let follower = monitor_for(&url);
    let result = probes::run_probe(&follower, &crypto()).await;
    assert_eq!(result.status, MonitorStatus::Healthy);
    assert_eq!(result.details["status_code"]["actual"], 200);

    let pinned: Monitor = serde_json::from_value(json!({
        "name": "web-no-follow",
        "space_id": "space-1",
        "monitor_type": "url",
        "url": url,
        "expected_status_code": 302,
        "timeout_seconds": 1,
        "check_ssl": false,
        "follow_redirects": false
    }))
    .unwrap();
    let result = probes::run_probe(&pinned, &crypto()).await;
    assert_eq!(result.status, MonitorStatus::Healthy);
    assert_eq!(result.details["status_code"]["actual"], 302);
}

#[tokio::test]
async fn failed_checks_zero_iff_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    for (expected, content) in [(200u16, None), (200, Some("ok")), (404, None)] {
        let mut monitor = monitor_for(&server.uri());
        if let MonitorSpec::Url(spec) = &mut monitor.spec {
            spec.expected_status_code = expected;
            spec.check_content = content.map(|c| c.to_string());
        }
        let result = probes::run_probe(&monitor, &crypto()).await;
        assert_eq!(
            result.failed_checks == 0,
            result.status == MonitorStatus::Healthy
        );
        let configured = 2 + usize::from(content.is_some());
        assert_eq!(result.check_list.len(), configured);
    }
}
