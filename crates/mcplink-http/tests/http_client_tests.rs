//! HTTP client tests against a mock MCP endpoint
//!
//! - JSON and SSE-framed responses
//! - Session header lifecycle
//! - Protocol and HTTP status errors
//! - Cancellation

use std::time::Duration;

use mcplink_core::{CallOptions, CancellationToken, ClientError, McpClient, SESSION_HEADER};
use mcplink_http::{HttpClientConfig, HttpMcpClient};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpMcpClient {
    HttpMcpClient::new(HttpClientConfig::with_endpoint(format!("{}/mcp", server.uri()))).unwrap()
}

fn json_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": "1",
        "result": result,
    }))
}

#[tokio::test]
async fn test_initialize_sends_handshake_without_session_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({
            "jsonrpc": "2.0",
            "method": "initialize",
            "params": {"capabilities": {}}
        })))
        .respond_with(json_result(json!({"protocolVersion": "2025-06-18"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.initialize(&CallOptions::new()).await.unwrap();
    assert_eq!(result["protocolVersion"], "2025-06-18");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get(SESSION_HEADER).is_none());
    assert!(
        requests[0]
            .headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/event-stream"))
    );

    // A local id was minted even though the server sent none
    let session = client.current_session_id().unwrap();
    assert_eq!(session.len(), 32);
}

#[tokio::test]
async fn test_later_calls_carry_session_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(json_result(json!({})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.initialize(&CallOptions::new()).await.unwrap();
    let session = client.current_session_id().unwrap();

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .and(header(SESSION_HEADER, session.as_str()))
        .respond_with(json_result(json!({"tools": []})))
        .expect(1)
        .mount(&server)
        .await;

    let tools = client.tools_list(&CallOptions::new(), None).await.unwrap();
    assert_eq!(tools, json!({"tools": []}));
}

#[tokio::test]
async fn test_adopts_server_assigned_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(json_result(json!({})).insert_header(SESSION_HEADER, "server-session-7"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "resources/list"})))
        .and(header(SESSION_HEADER, "server-session-7"))
        .respond_with(json_result(json!({"resources": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.initialize(&CallOptions::new()).await.unwrap();
    assert_eq!(client.current_session_id().as_deref(), Some("server-session-7"));

    client.resources_list(&CallOptions::new(), None).await.unwrap();
}

#[tokio::test]
async fn test_caller_supplied_session_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header(SESSION_HEADER, "abc123"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "hi"}}
        })))
        .respond_with(json_result(json!({"content": [{"type": "text", "text": "hi"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .tools_call(
            &CallOptions::new().with_session("abc123"),
            "echo",
            Some(json!({"text": "hi"})),
        )
        .await
        .unwrap();
    assert_eq!(result["content"][0]["text"], "hi");
}

#[tokio::test]
async fn test_sse_framed_response() {
    let server = MockServer::start().await;
    let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.tools_list(&CallOptions::new(), None).await.unwrap();
    assert_eq!(result, json!({"ok": true}));
}

#[tokio::test]
async fn test_sse_detected_without_content_type() {
    let server = MockServer::start().await;
    let body = ": ping\n\nevent: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"n\":2}}\n\n";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .resources_read(&CallOptions::new(), "file:///tmp/a.txt")
        .await
        .unwrap();
    assert_eq!(result, json!({"n": 2}));
}

#[tokio::test]
async fn test_error_envelope_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {"code": -32601, "message": "Method 'tools/list' not found"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.tools_list(&CallOptions::new(), None).await.unwrap_err();
    assert!(err.is_protocol());
    assert_eq!(err.code(), Some(-32601));
    assert_eq!(err.to_string(), "MCP error -32601: Method 'tools/list' not found");
}

#[tokio::test]
async fn test_null_result_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": "1"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.tools_list(&CallOptions::new(), None).await.unwrap();
    assert!(result.is_null());
}

#[tokio::test]
async fn test_non_success_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.tools_list(&CallOptions::new(), None).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("upstream down"));
}

#[tokio::test]
async fn test_session_header_adopted_from_error_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("boom")
                .insert_header(SESSION_HEADER, "server-on-error"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .tools_list(&CallOptions::new().with_session("mine"), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(client.current_session_id().as_deref(), Some("server-on-error"));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.tools_list(&CallOptions::new(), None).await.unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
}

#[tokio::test]
async fn test_endpoint_override() {
    let configured = MockServer::start().await;
    let other = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/alt"))
        .respond_with(json_result(json!({"from": "override"})))
        .expect(1)
        .mount(&other)
        .await;

    let client = client_for(&configured);
    let opts = CallOptions::new().with_endpoint(format!("{}/alt", other.uri()));
    let result = client.tools_list(&opts, None).await.unwrap();
    assert_eq!(result["from"], "override");
    assert!(configured.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_endpoint_fails_before_io() {
    let client = HttpMcpClient::new(HttpClientConfig::default()).unwrap();
    let err = client.tools_list(&CallOptions::new(), None).await.unwrap_err();
    assert!(matches!(err, ClientError::Configuration(_)));
}

#[tokio::test]
async fn test_cancellation_abandons_slow_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(json_result(json!({})).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let cancel = CancellationToken::new();
    let opts = CallOptions::new().with_cancel(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = client.tools_list(&opts, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled { .. }));
    trigger.await.unwrap();
}
