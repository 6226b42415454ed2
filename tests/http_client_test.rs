// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - HTTP Client Tests
 * Tests for redirect handling, body limits and transport error classification
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use exposure_scanner::errors::TransportError;
use exposure_scanner::http_client::{HttpClient, Transport};
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client(timeout_secs: u64, max_body: usize) -> HttpClient {
    HttpClient::new(Duration::from_secs(timeout_secs), max_body, Some("exposure-scanner-test")).unwrap()
}

#[tokio::test]
async fn test_http_client_get_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/db.sql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("CREATE TABLE users;"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/db.sql", &mock_server.uri());
    let response = client(5, 4096).get(&url).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, b"CREATE TABLE users;");
    assert_eq!(response.content_length, 19);
}

#[tokio::test]
async fn test_http_client_sends_configured_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.env"))
        .and(header("user-agent", "exposure-scanner-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("APP_KEY=x"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/.env", &mock_server.uri());
    let response = client(5, 4096).get(&url).await.unwrap();

    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_http_client_does_not_follow_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/backup"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/backup/"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/backup/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let url = format!("{}/backup", &mock_server.uri());
    let response = client(5, 4096).get(&url).await.unwrap();

    assert_eq!(response.status_code, 301);
    assert_eq!(response.header("location"), Some("/backup/"));
}

#[tokio::test]
async fn test_http_client_caps_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/site.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'A'; 10_000]))
        .mount(&mock_server)
        .await;

    let url = format!("{}/site.zip", &mock_server.uri());
    let response = client(5, 1024).get(&url).await.unwrap();

    assert_eq!(response.body.len(), 1024);
    assert_eq!(response.content_length, 10_000);
}

#[tokio::test]
async fn test_http_client_timeout_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let url = format!("{}/slow", &mock_server.uri());
    let err = client(1, 4096).get(&url).await.unwrap_err();

    assert!(err.is_timeout());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_http_client_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let url = format!("http://127.0.0.1:{}/db.sql", port);
    let err = client(2, 4096).get(&url).await.unwrap_err();

    assert!(matches!(err, TransportError::ConnectionRefused { .. }));
    assert!(!err.is_timeout());
}
