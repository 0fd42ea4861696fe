//! HTTP API integration tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::*;
use runlet_core::OwnerId;
use runlet_server::auth::{OWNER_HEADER, SCOPE_HEADER};
use serde_json::{Value, json};
use tower::ServiceExt;

fn api_request(method: &str, uri: &str, owner: OwnerId, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(OWNER_HEADER, owner.to_string())
        .header(SCOPE_HEADER, SCOPE);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(server: &TestServer, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = server.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(server: &TestServer, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(server, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

async fn create(server: &TestServer, name: &str, source: &str, env: Option<Value>) -> i64 {
    let mut body = json!({ "name": name, "content": BASE64.encode(source) });
    if let Some(env) = env {
        body["env"] = env;
    }
    let (status, body) = send_json(server, api_request("POST", "/v1/scripts", OWNER, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["id"].as_i64().unwrap()
}

fn invoke(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;
    let (status, body) = send_json(&server, invoke("GET", "/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage_backend"], "filesystem");
    assert_eq!(body["cached_handlers"], 0);
}

#[tokio::test]
async fn test_script_lifecycle() {
    let server = TestServer::new().await;
    let id = create(&server, "hello", &replying("hi"), None).await;

    let (status, body) = send_json(&server, api_request("GET", &format!("/v1/scripts/{id}"), OWNER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "hello");
    assert_eq!(body["scope"], SCOPE);
    assert_eq!(body["owner_id"], OWNER);

    let (status, body) = send_json(&server, api_request("GET", "/v1/scripts", OWNER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send_json(
        &server,
        api_request("GET", &format!("/v1/scripts/{id}/content"), OWNER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let content = BASE64.decode(body["content"].as_str().unwrap()).unwrap();
    assert_eq!(content, replying("hi").as_bytes());

    let (status, body) = send(&server, invoke("GET", "/lambda/acme/hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hi");

    let update = json!({ "name": "hello", "content": BASE64.encode(replying("updated")) });
    let (status, _) = send(
        &server,
        api_request("PUT", &format!("/v1/scripts/{id}"), OWNER, Some(update)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&server, invoke("GET", "/lambda/acme/hello")).await;
    assert_eq!(body, b"updated");

    let (status, _) = send(
        &server,
        api_request(
            "POST",
            &format!("/v1/scripts/{id}/rename"),
            OWNER,
            Some(json!({ "new_name": "greeter" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&server, invoke("GET", "/lambda/acme/hello")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&server, invoke("GET", "/lambda/acme/greeter")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"updated");

    let (status, _) = send(
        &server,
        api_request("DELETE", &format!("/v1/scripts/{id}"), OWNER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&server, invoke("GET", "/lambda/acme/greeter")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(
        &server,
        api_request("GET", &format!("/v1/scripts/{id}"), OWNER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invocation_sees_request() {
    let server = TestServer::new().await;
    let source = script(
        r#"ctx.set_status(201);
    ctx.set_header("x-handler", "echo");
    ctx.json(#{ method: ctx.method, path: ctx.path, q: ctx.query.q, body: ctx.body, region: ctx.env.region });"#,
    );
    create(&server, "echo", &source, Some(json!({ "region": "eu" }))).await;

    let request = Request::builder()
        .method("POST")
        .uri("/lambda/acme/echo/items/7?q=x&__runlet_debug=1")
        .body(Body::from("payload"))
        .unwrap();
    let response = server.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-handler"], "echo");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body,
        json!({ "method": "POST", "path": "/items/7", "q": "x", "body": "payload", "region": "eu" })
    );
}

#[tokio::test]
async fn test_missing_principal_is_unauthorized() {
    let server = TestServer::new().await;
    let (status, body) = send_json(&server, invoke("GET", "/v1/scripts")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let request = Request::builder()
        .uri("/v1/scripts")
        .header(OWNER_HEADER, "not-a-number")
        .header(SCOPE_HEADER, SCOPE)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&server, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let server = TestServer::new().await;
    let id = create(&server, "taken", &replying("x"), None).await;

    let (status, body) = send_json(
        &server,
        api_request("GET", &format!("/v1/scripts/{id}"), OTHER_OWNER, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = send_json(&server, api_request("GET", "/v1/scripts/9999", OWNER, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let duplicate = json!({ "name": "taken", "content": BASE64.encode(replying("y")) });
    let (status, body) = send_json(&server, api_request("POST", "/v1/scripts", OWNER, Some(duplicate))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "name_conflict");

    let no_entry = json!({ "name": "plain", "content": BASE64.encode("let x = 1;") });
    let (status, body) = send_json(&server, api_request("POST", "/v1/scripts", OWNER, Some(no_entry))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_content");

    let not_base64 = json!({ "name": "raw", "content": "%%%" });
    let (status, body) = send_json(&server, api_request("POST", "/v1/scripts", OWNER, Some(not_base64))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let bad_name = json!({ "name": "has space", "content": BASE64.encode(replying("z")) });
    let (status, body) = send_json(&server, api_request("POST", "/v1/scripts", OWNER, Some(bad_name))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_name");

    let (status, _) = send(&server, invoke("GET", "/lambda/acme/nothing-here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compile_error_is_unprocessable() {
    let server = TestServer::new().await;
    create(&server, "broken", &broken(), None).await;

    let (status, body) = send_json(&server, invoke("GET", "/lambda/acme/broken")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "compile_error");
}

#[tokio::test]
async fn test_tenant_error_stack_only_in_debug() {
    let server = TestServer::new().await;
    let source = r#"fn check(value) {
    if value == "" {
        throw "value required";
    }
}

fn handle_request(ctx) {
    check(ctx.body);
}

export const handler = Fn("handle_request");
"#;
    create(&server, "strict", source, None).await;

    let (status, body) = send_json(&server, invoke("POST", "/lambda/acme/strict")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "tenant_error");
    assert_eq!(body["message"], "value required");
    assert!(body.get("stack").is_none());

    let (status, body) = send_json(&server, invoke("POST", "/lambda/acme/strict?__runlet_debug=1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let stack: Vec<&str> = body["stack"]
        .as_array()
        .unwrap()
        .iter()
        .map(|frame| frame.as_str().unwrap())
        .collect();
    assert!(stack.iter().any(|frame| frame.starts_with("check (")));
    assert!(stack.iter().any(|frame| frame.starts_with("handle_request (")));
    assert!(stack.iter().all(|frame| frame.contains("lambda:acme/strict")));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    runlet_server::metrics::register_metrics();
    let server = TestServer::new().await;
    create(&server, "counted", &replying("x"), None).await;
    send(&server, invoke("GET", "/lambda/acme/counted")).await;

    let (status, body) = send(&server, invoke("GET", "/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("runlet_executions_total"));
    assert!(text.contains("runlet_script_mutations_total"));
}

#[tokio::test]
async fn test_metrics_can_be_disabled() {
    let server = TestServer::with_config(|config| config.server.metrics_enabled = false).await;
    let (status, _) = send(&server, invoke("GET", "/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
