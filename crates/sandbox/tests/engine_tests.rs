//! End-to-end compile and invoke tests for the sandbox engine.

mod common;

use common::{ORIGIN, compile, engine, request, script};
use runlet_core::config::SandboxLimits;
use runlet_sandbox::{Capabilities, ResponseBody, SandboxEngine};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_hello_world() {
    let engine = engine();
    let handler = compile(&engine, r#"ctx.send("hello world");"#);

    let response = engine
        .execute(handler, request("GET", "/"), false)
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, ResponseBody::Text("hello world".to_string()));
}

#[tokio::test]
async fn test_context_exposes_request() {
    let engine = engine();
    let handler = compile(
        &engine,
        r#"
    ctx.set_status(201);
    ctx.set_header("X-Kind", "echo");
    ctx.json(#{
        method: ctx.method,
        path: ctx.path,
        who: ctx.query["who"],
        agent: ctx.headers["user-agent"],
        body: ctx.body,
    });
"#,
    );

    let mut req = request("POST", "/items/7");
    req.query.insert("who".to_string(), "ada".to_string());
    req.headers
        .insert("user-agent".to_string(), "probe/1".to_string());
    req.body = "payload".to_string();

    let response = engine.execute(handler, req, false).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(
        response.headers,
        vec![("x-kind".to_string(), "echo".to_string())]
    );
    assert_eq!(
        response.body,
        ResponseBody::Json(json!({
            "method": "POST",
            "path": "/items/7",
            "who": "ada",
            "agent": "probe/1",
            "body": "payload",
        }))
    );
}

#[tokio::test]
async fn test_return_value_is_the_body() {
    let engine = engine();
    let text = compile(&engine, r#"`hi ${ctx.method}`"#);
    let map = compile(&engine, "#{ ok: true }");

    let response = engine
        .execute(text, request("PUT", "/"), false)
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Text("hi PUT".to_string()));

    let response = engine
        .execute(map, request("GET", "/"), false)
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Json(json!({"ok": true})));
}

#[tokio::test]
async fn test_env_is_a_read_only_copy() {
    let engine = engine();
    let src = script(
        r#"
    let e = ctx.env;
    e.region = "changed";
    ctx.json(#{ copy: e.region, original: ctx.env.region });
"#,
    );
    let handler = Arc::new(
        engine
            .compile(ORIGIN, &src, Some(&json!({"region": "eu"})))
            .unwrap(),
    );

    for _ in 0..2 {
        let response = engine
            .execute(Arc::clone(&handler), request("GET", "/"), false)
            .await
            .unwrap();
        assert_eq!(
            response.body,
            ResponseBody::Json(json!({"copy": "changed", "original": "eu"}))
        );
    }
}

#[tokio::test]
async fn test_missing_env_is_empty() {
    let engine = engine();
    let handler = compile(&engine, "ctx.env.len()");
    let response = engine
        .execute(handler, request("GET", "/"), false)
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Json(json!(0)));
}

#[tokio::test]
async fn test_responses_are_per_invocation() {
    let engine = engine();
    let handler = compile(
        &engine,
        r#"
    if ctx.path == "/missing" {
        ctx.set_status(404);
    }
    ctx.send(ctx.path);
"#,
    );

    let missing = engine
        .execute(Arc::clone(&handler), request("GET", "/missing"), false)
        .await
        .unwrap();
    let found = engine
        .execute(handler, request("GET", "/found"), false)
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
    assert_eq!(found.status, 200);
    assert_eq!(found.body, ResponseBody::Text("/found".to_string()));
}

#[tokio::test]
async fn test_throw_is_a_tenant_error_without_stack() {
    let engine = engine();
    let handler = compile(&engine, r#"throw "boom";"#);

    let err = engine
        .execute(handler, request("GET", "/"), false)
        .await
        .unwrap_err();
    assert_eq!(err.message, "boom");
    assert!(err.stack.is_none());
}

#[tokio::test]
async fn test_debug_stack_only_has_tenant_frames() {
    let engine = engine();
    let src = r#"
fn validate(value) {
    if type_of(value) == "()" {
        throw "missing id";
    }
    value
}

fn handle_request(ctx) {
    validate(ctx.query["id"])
}

export const handler = Fn("handle_request");
"#;
    let handler = Arc::new(engine.compile(ORIGIN, src, None).unwrap());

    let err = engine
        .execute(handler, request("GET", "/"), true)
        .await
        .unwrap_err();
    assert_eq!(err.message, "missing id");
    let stack = err.stack.expect("debug requested a stack");
    assert!(!stack.is_empty());
    for frame in &stack {
        assert!(frame.contains(ORIGIN), "foreign frame: {frame}");
    }
    assert!(stack.iter().any(|frame| frame.starts_with("validate (")));
    let outermost = stack.last().unwrap();
    assert!(
        outermost.starts_with("handle_request ("),
        "entry frame missing: {stack:?}"
    );
}

#[tokio::test]
async fn test_extension_module_frames_are_hidden() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("greeting.rhai"),
        r#"
fn hello(name) {
    `hello, ${name}`
}

fn explode() {
    throw "module failure";
}
"#,
    )
    .unwrap();
    let caps = Capabilities::with_extensions(dir.path(), vec!["greeting".to_string()]);
    let engine = SandboxEngine::new(&caps, &SandboxLimits::default()).unwrap();
    let handler = compile(
        &engine,
        r#"
    import "greeting" as greeting;
    if ctx.path == "/fail" {
        greeting::explode();
    }
    greeting::hello(ctx.query["name"])
"#,
    );

    let mut ok = request("GET", "/");
    ok.query.insert("name".to_string(), "ada".to_string());
    let response = engine
        .execute(Arc::clone(&handler), ok, false)
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Text("hello, ada".to_string()));

    let err = engine
        .execute(handler, request("GET", "/fail"), true)
        .await
        .unwrap_err();
    assert_eq!(err.message, "module failure");
    for frame in err.stack.unwrap() {
        assert!(frame.contains(ORIGIN), "foreign frame: {frame}");
        assert!(!frame.contains("explode"), "module frame leaked: {frame}");
    }
}

#[tokio::test]
async fn test_platform_json_module() {
    let engine = engine();
    let handler = compile(
        &engine,
        r#"
    import "json" as json;
    let data = json::parse(ctx.body);
    data.seen = true;
    json::stringify(data)
"#,
    );

    let mut req = request("POST", "/");
    req.body = r#"{"n":1}"#.to_string();
    let response = engine.execute(handler, req, false).await.unwrap();
    let ResponseBody::Text(text) = response.body else {
        panic!("expected a text body");
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({"n": 1, "seen": true}));
}

#[tokio::test]
async fn test_platform_crypto_and_base64_modules() {
    let engine = engine();
    let handler = compile(
        &engine,
        r#"
    import "crypto" as crypto;
    import "base64" as b64;
    #{ digest: crypto::sha256("abc"), encoded: b64::encode("hi"), decoded: b64::decode("aGk=") }
"#,
    );
    let response = engine
        .execute(handler, request("GET", "/"), false)
        .await
        .unwrap();
    assert_eq!(
        response.body,
        ResponseBody::Json(json!({
            "digest": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            "encoded": "aGk=",
            "decoded": "hi",
        }))
    );
}

#[tokio::test]
async fn test_unlisted_import_fails() {
    let engine = engine();
    let handler = compile(
        &engine,
        r#"
    import "fs" as fs;
    fs::read("/etc/passwd")
"#,
    );
    let err = engine
        .execute(handler, request("GET", "/"), false)
        .await
        .unwrap_err();
    assert!(err.message.contains("fs"), "{}", err.message);
}

#[test]
fn test_unlisted_top_level_import_fails_compile() {
    let engine = engine();
    let src = format!("import \"fs\" as fs;\n{}", script("()"));
    assert!(engine.compile(ORIGIN, &src, None).is_err());
}

#[test]
fn test_compile_rejects_contract_violations() {
    let engine = engine();
    let no_entry = "fn other(ctx) {}\nexport const handler = Fn(\"handle_request\");\n";
    let no_export = "fn handle_request(ctx) {}\n";
    let syntax = script("let = ;");

    assert!(engine.compile(ORIGIN, no_entry, None).is_err());
    assert!(engine.compile(ORIGIN, no_export, None).is_err());
    assert!(engine.compile(ORIGIN, &syntax, None).is_err());
}

#[test]
fn test_compile_rejects_non_object_env() {
    let engine = engine();
    assert!(
        engine
            .compile(ORIGIN, &script("()"), Some(&json!("text")))
            .is_err()
    );
}

#[tokio::test]
async fn test_operation_limit_stops_runaway_handler() {
    let limits = SandboxLimits {
        max_operations: 10_000,
        ..Default::default()
    };
    let engine = SandboxEngine::new(&Capabilities::platform(), &limits).unwrap();
    let handler = compile(&engine, "let n = 0;\n    loop { n += 1; }");

    let err = engine
        .execute(handler, request("GET", "/"), false)
        .await
        .unwrap_err();
    assert!(!err.message.is_empty());
}
