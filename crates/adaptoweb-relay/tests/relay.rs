//! Integration tests for adaptoweb-relay.
//!
//! Drive the protocol handler the way a host does: open pages, push settings,
//! mutate pages, and send interaction events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use adaptoweb_relay::protocol::ProtocolHandler;
use adaptoweb_relay::store::SettingsStore;
use adaptoweb_relay::transport::framing;
use adaptoweb_relay::types::*;

// ─────────────────────── helpers ───────────────────────

const ARTICLE: &str = r#"<html><body>
    <nav class="nav"><a href="/">Home</a></nav>
    <article>
        <h1>Report</h1>
        <p>We utilize numerous tools to demonstrate the idea. Furthermore, the results were significant.</p>
    </article>
    <aside class="sidebar">Related links</aside>
    <form id="signup">
        <label for="a">A</label><input id="a" name="a">
        <label for="b">B</label><input id="b" name="b">
        <label for="c">C</label><input id="c" name="c">
        <label for="d">D</label><input id="d" name="d">
        <label for="e">E</label><input id="e" name="e">
        <label for="f">F</label><input id="f" name="f">
        <button>Join</button>
    </form>
</body></html>"#;

/// Create a handler backed by a settings file in `dir`.
fn temp_handler(dir: &tempfile::TempDir) -> ProtocolHandler {
    let path = dir.path().join("settings.json");
    let store = SettingsStore::open(path.to_str().unwrap());
    ProtocolHandler::new(Arc::new(Mutex::new(store)))
}

/// Build a JSON-RPC request.
fn request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

/// Send a JSON-RPC message through the handler and return the response.
async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
    let parsed: JsonRpcMessage = serde_json::from_value(msg).unwrap();
    handler.handle_message(parsed).await
}

/// Send and return the `result` member, failing on an error response.
async fn call(handler: &ProtocolHandler, method: &str, params: Value) -> Value {
    let response = send(handler, request(1, method, params))
        .await
        .expect("expected response");
    assert!(
        response.get("error").is_none(),
        "{method} failed: {response}"
    );
    response["result"].clone()
}

/// Send and return the error code.
async fn call_err(handler: &ProtocolHandler, method: &str, params: Value) -> i64 {
    let response = send(handler, request(1, method, params))
        .await
        .expect("expected response");
    response["error"]["code"].as_i64().expect("expected error")
}

async fn open(handler: &ProtocolHandler, page_id: &str, html: &str) {
    call(handler, "openPage", json!({ "pageId": page_id, "html": html })).await;
}

async fn render(handler: &ProtocolHandler, page_id: &str) -> String {
    let result = call(handler, "renderPage", json!({ "pageId": page_id })).await;
    result["html"].as_str().unwrap().to_string()
}

// ═══════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_get_settings_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    let settings = call(&handler, "getSettings", json!({})).await;
    assert_eq!(settings["enabled"], true);
    assert_eq!(settings["languageSimplification"], false);
    assert_eq!(settings["simplificationLevel"], 2);
    assert_eq!(settings["lineSpacing"], 1.5);
}

#[tokio::test]
async fn test_update_settings_persists_and_merges() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);

    let result = call(
        &handler,
        "updateSettings",
        json!({ "settings": { "fontSize": 20, "theme": "dark" } }),
    )
    .await;
    assert_eq!(result["success"], true);
    assert_eq!(result["settings"]["fontSize"], 20);
    assert_eq!(result["settings"]["lineSpacing"], 1.5);

    let raw = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["fontSize"], 20);
    assert_eq!(stored["theme"], "dark");
}

#[tokio::test]
async fn test_status_label_follows_toggles() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);

    let status = call(&handler, "getStatus", json!({})).await;
    assert_eq!(status["label"], "Active (2 modules)");
    assert_eq!(status["openPages"], 0);

    call(&handler, "toggleExtension", json!({})).await;
    let status = call(&handler, "getStatus", json!({})).await;
    assert_eq!(status["label"], "Disabled");
}

#[tokio::test]
async fn test_unknown_module_is_invalid_params() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    let code = call_err(
        &handler,
        "toggleModule",
        json!({ "module": "darkMode", "enabled": true }),
    )
    .await;
    assert_eq!(code, error_codes::INVALID_PARAMS as i64);
}

#[tokio::test]
async fn test_settings_broadcast_notification() {
    let dir = tempfile::tempdir().unwrap();
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let handler = temp_handler(&dir).with_notifier(sender);

    call(
        &handler,
        "toggleModule",
        json!({ "module": "languageSimplification", "enabled": true }),
    )
    .await;

    let notification = receiver.try_recv().expect("expected a notification");
    assert_eq!(notification.method, SETTINGS_UPDATED);
    let params = notification.params.unwrap();
    assert_eq!(params["settings"]["languageSimplification"], true);
}

// ═══════════════════════════════════════════════════════
// PAGES
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_open_page_adapts_with_stored_settings() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);

    let result = call(&handler, "openPage", json!({ "html": ARTICLE })).await;
    let page_id = result["pageId"].as_str().unwrap().to_string();
    assert_eq!(result["changes"].as_array().unwrap().len(), 2);

    let html = render(&handler, &page_id).await;
    assert!(html.contains(r#"<aside class="sidebar" data-adaptoweb-orig-display="" data-adaptoweb-orig-visibility="" style="display: none;" data-adaptoweb-hidden="true">"#));
    assert!(html.contains("data-adaptoweb-styled"));
    assert!(html.contains("data-adaptoweb-trigger"));
    assert!(!html.contains("data-adaptoweb-simplified"));
}

#[tokio::test]
async fn test_toggle_module_readapts_open_pages() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    open(&handler, "a", ARTICLE).await;
    open(&handler, "b", ARTICLE).await;

    call(
        &handler,
        "toggleModule",
        json!({ "module": "languageSimplification", "enabled": true }),
    )
    .await;

    for page in ["a", "b"] {
        let html = render(&handler, page).await;
        assert!(html.contains("We use many tools to show the idea.\nAlso"));
        assert!(html.contains("data-adaptoweb-original-text"));
    }
}

#[tokio::test]
async fn test_disable_restores_original_markup() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    let pristine = {
        let doc = adaptoweb::parse_document(ARTICLE).unwrap();
        adaptoweb::to_html(&doc)
    };

    open(&handler, "p", ARTICLE).await;
    assert_ne!(render(&handler, "p").await, pristine);

    call(&handler, "toggleExtension", json!({})).await;
    assert_eq!(render(&handler, "p").await, pristine);
}

#[tokio::test]
async fn test_close_page_and_missing_page() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    open(&handler, "p", ARTICLE).await;

    call(&handler, "closePage", json!({ "pageId": "p" })).await;
    let code = call_err(&handler, "renderPage", json!({ "pageId": "p" })).await;
    assert_eq!(code, relay_error_codes::PAGE_NOT_FOUND as i64);
}

#[tokio::test]
async fn test_append_html_is_debounced() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    open(&handler, "p", ARTICLE).await;

    for _ in 0..5 {
        let result = call(
            &handler,
            "appendHtml",
            json!({ "pageId": "p", "html": "<div class=\"ads\">Buy now</div>" }),
        )
        .await;
        assert_eq!(result["inserted"], 1);
        assert_eq!(result["scheduled"], true);
    }

    let deadline = handler.next_deadline().await.expect("pending deadline");
    assert_eq!(handler.tick(Instant::now()).await, 0);
    assert_eq!(handler.tick(deadline + Duration::from_millis(1)).await, 1);
    assert!(handler.next_deadline().await.is_none());

    let html = render(&handler, "p").await;
    assert_eq!(html.matches(r#"class="ads" data-adaptoweb-orig-display"#).count(), 5);

    let result = call(&handler, "renderPage", json!({ "pageId": "p" })).await;
    assert_eq!(result["reapplyCount"], 1);
}

#[tokio::test]
async fn test_wizard_through_dispatch_event() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    open(&handler, "p", ARTICLE).await;

    let result = call(
        &handler,
        "dispatchEvent",
        json!({ "pageId": "p", "selector": "[data-adaptoweb-trigger]", "event": "click" }),
    )
    .await;
    assert_eq!(result["handled"], 1);
    let html = render(&handler, "p").await;
    assert!(html.contains("Step 1 of 2"));

    // Inputs in document order: six live fields, then three wizard clones.
    let result = call(
        &handler,
        "dispatchEvent",
        json!({
            "pageId": "p",
            "selector": "input",
            "index": 6,
            "event": "input",
            "value": "hello"
        }),
    )
    .await;
    assert_eq!(result["handled"], 1);
    let html = render(&handler, "p").await;
    assert!(html.contains(r#"<input id="a" name="a" value="hello">"#));
}

#[tokio::test]
async fn test_dispatch_event_with_descendant_selector() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    open(&handler, "p", ARTICLE).await;

    // The submit button comes first, the wizard trigger is appended after it.
    let result = call(
        &handler,
        "dispatchEvent",
        json!({ "pageId": "p", "selector": "form#signup > button", "index": 1, "event": "click" }),
    )
    .await;
    assert_eq!(result["handled"], 1);
    assert!(render(&handler, "p").await.contains("Step 1 of 2"));

    let result = call(
        &handler,
        "dispatchEvent",
        json!({ "pageId": "p", "selector": "form button", "event": "click" }),
    )
    .await;
    assert_eq!(result["handled"], 0);
}

#[tokio::test]
async fn test_stray_response_and_bad_params_shape() {
    let parsed = framing::parse_message(r#"{"jsonrpc":"2.0","id":5,"error":{"code":1,"message":"x"}}"#);
    let rejected = parsed.unwrap_err();
    assert_eq!(rejected.id, RequestId::Number(5));
    assert_eq!(rejected.error.code(), error_codes::INVALID_REQUEST);

    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    let code = call_err(&handler, "openPage", json!(["p", "<p></p>"])).await;
    assert_eq!(code, error_codes::INVALID_PARAMS as i64);
    let code = call_err(&handler, "closePage", Value::Null).await;
    assert_eq!(code, error_codes::INVALID_PARAMS as i64);
    call(&handler, "ping", Value::Null).await;
}

#[tokio::test]
async fn test_dispatch_event_errors() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    open(&handler, "p", ARTICLE).await;

    let code = call_err(
        &handler,
        "dispatchEvent",
        json!({ "pageId": "p", "selector": "form input[", "event": "click" }),
    )
    .await;
    assert_eq!(code, error_codes::INVALID_PARAMS as i64);

    let code = call_err(
        &handler,
        "dispatchEvent",
        json!({ "pageId": "p", "selector": "#nothing", "event": "click" }),
    )
    .await;
    assert_eq!(code, relay_error_codes::ELEMENT_NOT_FOUND as i64);
}

// ═══════════════════════════════════════════════════════
// PROTOCOL
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_unknown_method_and_bad_version() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);

    let code = call_err(&handler, "resources/list", json!({})).await;
    assert_eq!(code, error_codes::METHOD_NOT_FOUND as i64);

    let response = send(
        &handler,
        json!({ "jsonrpc": "1.0", "id": 3, "method": "ping" }),
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(response["id"], 3);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    let response = send(&handler, json!({ "jsonrpc": "2.0", "method": "exit" })).await;
    assert!(response.is_none());
}

#[tokio::test]
async fn test_missing_params() {
    let dir = tempfile::tempdir().unwrap();
    let handler = temp_handler(&dir);
    let response = send(
        &handler,
        json!({ "jsonrpc": "2.0", "id": "x", "method": "openPage" }),
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    assert_eq!(response["id"], "x");
}

#[test]
fn test_framing_round_trip_of_notification() {
    let notification = JsonRpcNotification::new(
        SETTINGS_UPDATED.to_string(),
        Some(json!({ "settings": { "enabled": false } })),
    );
    let value = serde_json::to_value(&notification).unwrap();
    let line = framing::frame_message(&value).unwrap();
    let parsed = framing::parse_message(&line).unwrap();
    assert!(matches!(parsed, JsonRpcMessage::Notification(n) if n.method == SETTINGS_UPDATED));
}
