#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use trail_quest_back::{
    config::AppConfig,
    routes,
    services::storage_supervisor::{self, StorageBackend},
    state::{AppState, SharedState},
};

pub const ADMIN_TOKEN: &str = "test-admin";

/// Router backed by a seeded in-memory store, plus its state for direct inspection.
pub async fn create_test_app() -> (Router, SharedState) {
    let config = AppConfig {
        admin_token: Some(ADMIN_TOKEN.to_owned()),
        ..AppConfig::default()
    };
    let state = AppState::new(config);
    storage_supervisor::start(state.clone(), StorageBackend::Memory).await;
    (routes::router(state.clone()), state)
}

/// Bearer-authenticated request.
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    send(app, builder, body).await
}

/// Request carrying the admin token header.
pub async fn admin_call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-admin-token", ADMIN_TOKEN);
    send(app, builder, body).await
}

async fn send(
    app: &Router,
    builder: axum::http::request::Builder,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Join with `join_token` and return the session token.
pub async fn join(app: &Router, join_token: &str, player_name: &str) -> Value {
    let (status, body) = call(
        app,
        "POST",
        "/join",
        None,
        Some(serde_json::json!({ "joinToken": join_token, "playerName": player_name })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "join failed: {body}");
    body
}
