//! Starts an axum server and exercises it with reqwest.

use std::sync::Arc;

use serde_json::{json, Value};
use sifted_rust::http::{self, ApiState};
use sifted_rust::QueryConfig;

use crate::support::registry;

/// Bind to port 0 and return the actual address.
async fn start_server() -> String {
    let state = ApiState::new(Arc::new(QueryConfig::default()), Arc::new(registry()));
    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_check() {
    let base = start_server().await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "entities": ["post", "user"] }));
}

#[tokio::test]
async fn find_filters_sorts_populates_and_paginates() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/post"))
        .query(&[
            ("status", "live"),
            ("sort", "-views"),
            ("limit", "1"),
            ("select", "title"),
            ("populate", r#"{"path":"author","entity":"user","select":"name"}"#),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"]["docs"],
        json!([{ "_id": "c", "title": "Gamma", "author": { "_id": "u2", "name": "Bob" } }])
    );
    assert_eq!(body["data"]["limit"], 1);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["pages"], 2);
    assert_eq!(body["data"]["hasNextPage"], true);
    assert_eq!(body["data"]["nextPage"], 2);
}

#[tokio::test]
async fn last_page_reports_total() {
    let base = start_server().await;

    let resp = reqwest::get(format!("{base}/post?status=live&limit=1&page=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["docs"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["hasNextPage"], false);
    assert_eq!(body["data"]["hasPrevPage"], true);
}

#[tokio::test]
async fn populate_of_unregistered_entity_fails() {
    let base = start_server().await;

    let resp = reqwest::get(format!("{base}/post/a?populate=author&select=title"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["code"], "entity_not_registered");
    assert_eq!(body["errors"][0]["message"], "entity not registered: author");
}

#[tokio::test]
async fn find_one_with_entity_override() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/post/b"))
        .query(&[("populate", r#"[{"path":"author","entity":"user"}]"#)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Beta");
    assert_eq!(body["data"]["author"]["email"], "bob@example.com");
}

#[tokio::test]
async fn missing_document_is_not_found() {
    let base = start_server().await;

    let resp = reqwest::get(format!("{base}/post/zzz")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["code"], "not_found");
}

#[tokio::test]
async fn unknown_entity_is_not_found() {
    let base = start_server().await;

    let resp = reqwest::get(format!("{base}/invoice")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"][0]["code"], "unknown_entity");
}
