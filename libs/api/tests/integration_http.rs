//! Integration tests for the REST client against a scripted HTTP server

#[macro_use]
mod common;

use common::*;
use keytone_api::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct SessionBody {
    id: String,
    generated_music_count: u32,
}

fn fast_client(server: &MockHttpServer) -> ApiClient {
    ApiClient::new(ApiConfig {
        base_url: server.base_url(),
        timeout_ms: 2_000,
        max_retries: 3,
        retry_base_ms: 10,
        retry_max_ms: 40,
    })
    .unwrap()
}

#[tokio::test]
async fn test_get_decodes_wrapped_payload() {
    let server = MockHttpServer::start(vec![(
        200,
        r#"{"success":true,"data":{"id":"s1","generated_music_count":2}}"#,
    )])
    .await;
    let client = fast_client(&server);

    let response: ApiResponse<SessionBody> = client.get("/sessions/s1", None).await;
    verbose_println!("  Response: {:?}", response);

    assert!(response.success);
    assert_eq!(
        response.data,
        Some(SessionBody {
            id: "s1".into(),
            generated_music_count: 2
        })
    );
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/api/sessions/s1");
}

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let server = MockHttpServer::start(vec![
        (503, r#"{"error":"warming up"}"#),
        (429, r#"{"error":"slow down"}"#),
        (200, r#"{"id":"s2","generated_music_count":0}"#),
    ])
    .await;
    let client = fast_client(&server);

    let response: ApiResponse<SessionBody> = client
        .post(
            "sessions",
            &json!({"id": "s2", "generated_music_count": 0}),
            Some(RequestOptions::default().header("x-client", "keytone")),
        )
        .await;

    assert!(response.success);
    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.method == "POST"));
    let body: Value = serde_json::from_str(&requests[2].body).unwrap();
    assert_eq!(body["id"], "s2");
    assert!(requests[0]
        .headers
        .contains(&("x-client".to_string(), "keytone".to_string())));
}

#[tokio::test]
async fn test_client_errors_fail_without_retry() {
    let server = MockHttpServer::start(vec![(404, r#"{"error":"session not found"}"#)]).await;
    let client = fast_client(&server);

    let response: ApiResponse<SessionBody> = client.delete("sessions/missing", None).await;

    assert!(!response.success);
    assert!(response.data.is_none());
    assert!(response.error.unwrap().contains("session not found"));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_retries_give_up_after_limit() {
    let server = MockHttpServer::start(vec![(500, "{}"); 10]).await;
    let client = fast_client(&server);

    let response: ApiResponse<Value> = client
        .patch(
            "sessions/s1",
            &json!({"is_active": false}),
            Some(RequestOptions::default().retries(1)),
        )
        .await;

    assert!(!response.success);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_unreachable_host_resolves_to_failure() {
    let client = ApiClient::new(ApiConfig {
        base_url: "http://127.0.0.1:1".into(),
        timeout_ms: 500,
        max_retries: 1,
        retry_base_ms: 5,
        retry_max_ms: 5,
    })
    .unwrap();

    let response: ApiResponse<Value> = client
        .put("music/1", &json!({}), Some(RequestOptions::default().timeout(Duration::from_millis(200))))
        .await;

    assert!(!response.success);
    assert!(response.error.is_some());
}
