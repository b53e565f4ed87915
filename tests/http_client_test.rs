//! Collaborator POSTs against a mock server.

mod common;

use std::time::Duration;

use common::logger::TestLogger;
use serde_json::json;
use showroom::core::http::{build_client, post_json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn posts_json_with_bearer_token() {
    let log = TestLogger::new("posts_json_with_bearer_token");

    log.phase("setup");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_secret"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "subject": "hello" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"1\"}"))
        .expect(1)
        .mount(&server)
        .await;
    let client = build_client(Duration::from_secs(5)).unwrap();

    log.phase("execute");
    let url = format!("{}/emails", server.uri());
    log.http_request("POST", &url);
    let body = post_json(&client, &url, Some("re_secret"), &json!({ "subject": "hello" }))
        .await
        .unwrap();

    log.phase("verify");
    assert_eq!(body, "{\"id\":\"1\"}");

    log.finish_ok();
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let log = TestLogger::new("non_success_status_is_an_error");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;
    let client = build_client(Duration::from_secs(5)).unwrap();

    let err = post_json(&client, &server.uri(), None, &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SHOW-N003");
    assert!(err.to_string().contains("422"), "{err}");

    log.finish_ok();
}

#[tokio::test]
async fn slow_collaborator_times_out() {
    let log = TestLogger::new("slow_collaborator_times_out");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let client = build_client(Duration::from_millis(200)).unwrap();

    let err = post_json(&client, &server.uri(), None, &json!({}))
        .await
        .unwrap_err();
    assert!(err.is_connectivity());
    assert_eq!(err.error_code(), "SHOW-N002");

    log.finish_ok();
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let log = TestLogger::new("redirects_are_not_followed");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
        .mount(&server)
        .await;
    let client = build_client(Duration::from_secs(5)).unwrap();

    let err = post_json(&client, &server.uri(), None, &json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SHOW-N003");

    log.finish_ok();
}
