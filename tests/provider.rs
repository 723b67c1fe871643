//! Provider gateway integration tests against a stub messaging provider

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde_json::{Value, json};
use shopchat_gateway::db::InstanceRepo;

mod common;
use common::{TestApp, get_request, json_request, send, serve_stub, test_app};

async fn app_with_provider(provider: Router, extra: &[(&str, String)]) -> TestApp {
    let base = serve_stub(provider).await;
    let mut vars = vec![("UAZAPI_BASE", base)];
    vars.extend(extra.iter().cloned());
    test_app(&vars, None)
}

async fn create(app: &TestApp, name: &str) -> (StatusCode, Value) {
    send(
        &app.router,
        json_request("POST", "/wa/instances", 1, 1, &json!({ "name": name })),
    )
    .await
}

#[tokio::test]
async fn test_create_with_nested_response() {
    let provider = Router::new().route(
        "/instances",
        post(|| async { Json(json!({ "instance": { "id": "inst-nested", "token": "tok-nested" } })) }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = create(&app, "nested").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["instanceId"], "inst-nested");
    assert_eq!(body["token"], "tok-nested");
    // Provider fields are passed through
    assert_eq!(body["instance"]["id"], "inst-nested");

    let stored = InstanceRepo::new(app.db.clone()).find("inst-nested").unwrap().unwrap();
    assert_eq!(stored.token, "tok-nested");
}

#[tokio::test]
async fn test_create_with_flat_response_and_alternate_token_key() {
    let provider = Router::new().route(
        "/instances",
        post(|| async { Json(json!({ "name": "inst-flat", "instanceToken": "tok-flat" })) }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = create(&app, "flat").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["instanceId"], "inst-flat");
    assert_eq!(body["token"], "tok-flat");
}

#[tokio::test]
async fn test_create_without_id_generates_one() {
    let provider = Router::new().route(
        "/instances",
        post(|| async { Json(json!({ "token": "tok-only" })) }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = create(&app, "Minha Loja").await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["instanceId"].as_str().unwrap().starts_with("minha-loja-"));
}

#[tokio::test]
async fn test_create_without_token_is_validation_error() {
    let provider = Router::new().route(
        "/instances",
        post(|| async { Json(json!({ "instance": { "id": "inst-x" } })) }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = create(&app, "x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(InstanceRepo::new(app.db.clone()).find("inst-x").unwrap().is_none());
}

#[tokio::test]
async fn test_create_provider_failure_is_bad_gateway() {
    let provider = Router::new().route(
        "/instances",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = create(&app, "x").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "provider_error");
}

#[tokio::test]
async fn test_auth_header_template_is_applied() {
    let provider = Router::new().route(
        "/instances",
        post(|headers: HeaderMap| async move {
            if headers.get("apikey").is_some_and(|v| v == "key-123") {
                (StatusCode::OK, Json(json!({ "instanceId": "authed", "token": "t" })))
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "no key" })))
            }
        }),
    );
    let app = app_with_provider(
        provider,
        &[
            ("UAZAPI_TOKEN", "key-123".to_string()),
            ("UAZAPI_AUTH_HEADER", "apikey".to_string()),
            ("UAZAPI_AUTH_VALUE", "%s".to_string()),
        ],
    )
    .await;

    let (status, body) = create(&app, "x").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["instanceId"], "authed");
}

#[tokio::test]
async fn test_status_uses_stored_token_and_persists_snapshot() {
    let provider = Router::new()
        .route(
            "/instances",
            post(|| async { Json(json!({ "instanceId": "inst-s", "token": "stored-tok" })) }),
        )
        .route(
            "/instances/{id}/status",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({ "connect": { "status": "connected" }, "seenToken": q.get("token") }))
            }),
        );
    let app = app_with_provider(provider, &[]).await;
    create(&app, "s").await;

    let (status, body) = send(&app.router, get_request("/wa/instances/inst-s/status", 1, 1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seenToken"], "stored-tok");
    assert_eq!(body["instance"], "inst-s");
    assert_eq!(body["status"], "connected");

    let (_, body) = send(
        &app.router,
        get_request("/wa/instances/inst-s/status?token=explicit", 1, 1),
    )
    .await;
    assert_eq!(body["seenToken"], "explicit");

    let stored = InstanceRepo::new(app.db.clone()).find("inst-s").unwrap().unwrap();
    assert_eq!(stored.status.unwrap()["status"], "connected");
}

#[tokio::test]
async fn test_qr_falls_back_to_second_path() {
    let provider = Router::new()
        .route("/instances/{id}/qr", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/instances/{id}/qrcode",
            get(|Path(id): Path<String>| async move { Json(json!({ "qrcode": format!("QR-{id}") })) }),
        );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = send(&app.router, get_request("/wa/instances/inst-q/qr", 1, 1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["qrcode"], "QR-inst-q");
}

#[tokio::test]
async fn test_qr_exhaustion_returns_placeholder() {
    let provider = Router::new()
        .route("/instances/{id}/qr", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/instances/{id}/qrcode", get(|| async { StatusCode::OK }));
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = send(&app.router, get_request("/wa/instances/inst-q/qrcode", 1, 1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "instance": "inst-q", "status": "waiting-qr" }));
}

#[tokio::test]
async fn test_webhook_registration_failure_keeps_local_url() {
    let provider = Router::new().route(
        "/instances/{id}/webhook",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "provider down") }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/wa/instances/inst-w/webhook",
            6,
            1,
            &json!({ "url": "https://agent.example/w", "token": "tok-w" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");

    let stored = InstanceRepo::new(app.db.clone()).find("inst-w").unwrap().unwrap();
    assert_eq!(stored.webhook_url.as_deref(), Some("https://agent.example/w"));
    assert_eq!(stored.tenant.org_id, 6);
}

#[tokio::test]
async fn test_webhook_body_is_passed_through_with_stored_token() {
    let provider = Router::new()
        .route(
            "/instances",
            post(|| async { Json(json!({ "instanceId": "inst-p", "token": "tok-p" })) }),
        )
        .route(
            "/instances/{id}/webhook",
            post(|Json(body): Json<Value>| async move { Json(json!({ "received": body })) }),
        );
    let app = app_with_provider(provider, &[]).await;
    create(&app, "p").await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/wa/instances/inst-p/webhook",
            1,
            1,
            &json!({ "url": "https://agent.example/p", "events": ["messages", "connection"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"]["url"], "https://agent.example/p");
    assert_eq!(body["received"]["token"], "tok-p");
    assert_eq!(body["received"]["events"], json!(["messages", "connection"]));
}

#[tokio::test]
async fn test_send_text_rejection_is_service_unavailable() {
    let provider = Router::new().route(
        "/instances/{id}/send/text",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "device disconnected" })),
            )
        }),
    );
    let app = app_with_provider(provider, &[]).await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/wa/instances/inst-t/send/text",
            1,
            1,
            &json!({ "token": "t", "to": "5511", "text": "oi" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "provider_unavailable");
    assert_eq!(body["error"]["message"], "device disconnected");
}

#[tokio::test]
async fn test_unreachable_provider_is_bad_gateway() {
    let app = test_app(&[("UAZAPI_BASE", "http://127.0.0.1:9".to_string())], None);

    let (status, _) = send(&app.router, get_request("/wa/instances/x/status?token=t", 1, 1)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // QR never fails the caller
    let (status, body) = send(&app.router, get_request("/wa/instances/x/qr", 1, 1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "waiting-qr");
}
