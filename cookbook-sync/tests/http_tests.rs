//! HTTP adapter tests
//!
//! Runs a small gateway and storage endpoint on an ephemeral local port and
//! drives `HttpGateway` and `HttpObjectStore` against it.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use cookbook_common::api::{KeyRing, SESSION_COOKIE};
use cookbook_sync::http::{HttpGateway, HttpObjectStore};
use cookbook_sync::{CredentialIssuer, ObjectStore, Recipe, RecipeGateway, SyncError, UploadFile};
use serde_json::{json, Value};

const SIGNING_KEYS: &str = "current-key,previous-key";

#[derive(Clone)]
struct ServerState {
    keys: KeyRing,
    base: String,
    saved: Arc<Mutex<Vec<Value>>>,
    uploads: Arc<Mutex<Vec<(Option<String>, Vec<u8>)>>>,
}

async fn gateway(State(state): State<ServerState>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.keys.read_signed(cookie, SESSION_COOKIE).is_none() {
        return Json(json!({ "data": null, "errors": [{ "message": "Not signed in", "path": ["recipe"] }] }));
    }

    let query = body["query"].as_str().unwrap_or_default();
    if query.contains("list") {
        Json(json!({ "data": { "recipe": { "list": [
            {
                "id": "r1",
                "name": "Soup",
                "difficulty": 2,
                "created": "2021-03-01T09:00:00Z",
                "creator": "cook@example.com",
                "image": null,
                "content": "Boil water"
            },
            { "id": "r2", "created": "2021-03-02T09:00:00Z" }
        ] } } }))
    } else if query.contains("save") {
        state.saved.lock().unwrap().push(body["variables"]["recipes"].clone());
        Json(json!({ "data": { "recipe": { "save": true } } }))
    } else if query.contains("upload") {
        let name = body["variables"]["name"].as_str().unwrap_or_default();
        if name == "denied.jpg" {
            return Json(json!({ "data": { "recipe": { "upload": null } } }));
        }
        let bucket = if name == "forbidden.jpg" { "bucket-denied" } else { "bucket" };
        Json(json!({ "data": { "recipe": { "upload": {
            "upload": {
                "url": format!("{}/{}", state.base, bucket),
                "fields": { "key": name, "policy": "p0l1cy" }
            },
            "link": format!("https://cdn.example/{}", name)
        } } } }))
    } else {
        Json(json!({ "errors": [{ "message": "Unknown query" }] }))
    }
}

async fn bucket(State(state): State<ServerState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.uploads.lock().unwrap().push((content_type, body.to_vec()));
    StatusCode::NO_CONTENT
}

async fn bucket_denied() -> StatusCode {
    StatusCode::FORBIDDEN
}

async fn broken() -> StatusCode {
    StatusCode::BAD_GATEWAY
}

/// Start the test server, returning its state and base URL
async fn start_server() -> ServerState {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let state = ServerState {
        keys: KeyRing::parse(SIGNING_KEYS).unwrap(),
        base,
        saved: Arc::new(Mutex::new(Vec::new())),
        uploads: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/graphql", post(gateway))
        .route("/broken", post(broken))
        .route("/bucket", post(bucket))
        .route("/bucket-denied", post(bucket_denied))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    state
}

fn signed_client(state: &ServerState) -> HttpGateway {
    let cookie = state.keys.cookie_header(SESSION_COOKIE, "cook@example.com");
    HttpGateway::new(format!("{}/graphql", state.base), Some(cookie)).unwrap()
}

#[tokio::test]
async fn test_load_recipes_decodes_list() {
    let state = start_server().await;
    let client = signed_client(&state);

    let recipes = client.load_recipes().await.unwrap();

    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0].name, "Soup");
    assert_eq!(recipes[0].creator.as_deref(), Some("cook@example.com"));
    assert_eq!(recipes[1].difficulty, 1);
    assert_eq!(recipes[1].name, "");
    assert_eq!(recipes[1].created, Utc.with_ymd_and_hms(2021, 3, 2, 9, 0, 0).unwrap());
}

#[tokio::test]
async fn test_save_recipes_sends_full_collection() {
    let state = start_server().await;
    let client = signed_client(&state);

    let recipes = vec![
        Recipe::blank("a".to_string(), None, Utc::now()),
        Recipe::blank("b".to_string(), None, Utc::now()),
    ];
    client.save_recipes(&recipes).await.unwrap();

    let saved = state.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0][0]["id"], "a");
    assert_eq!(saved[0][1]["id"], "b");
}

#[tokio::test]
async fn test_cookie_signed_with_previous_key_is_accepted() {
    let state = start_server().await;
    let old_ring = KeyRing::parse("previous-key").unwrap();
    let client = HttpGateway::new(
        format!("{}/graphql", state.base),
        Some(old_ring.cookie_header(SESSION_COOKIE, "cook@example.com")),
    )
    .unwrap();

    assert!(client.load_recipes().await.is_ok());
}

#[tokio::test]
async fn test_unsigned_request_gets_query_error() {
    let state = start_server().await;
    let client = HttpGateway::new(format!("{}/graphql", state.base), Some("forged".to_string())).unwrap();

    let err = client.load_recipes().await.unwrap_err();
    match err {
        SyncError::Query(errors) => assert_eq!(errors[0].message, "Not signed in"),
        other => panic!("expected query error, got {:?}", other),
    }
    assert!(!client.save_recipes(&[]).await.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_gateway_status_is_retryable() {
    let state = start_server().await;
    let client = HttpGateway::new(format!("{}/broken", state.base), None).unwrap();

    let err = client.save_recipes(&[]).await.unwrap_err();
    assert!(matches!(err, SyncError::GatewayStatus { status: 502 }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_issue_and_write_object() {
    let state = start_server().await;
    let client = signed_client(&state);
    let storage = HttpObjectStore::new().unwrap();

    let capability = client.issue("pie.jpg").await.unwrap().unwrap();
    assert_eq!(capability.link(), "https://cdn.example/pie.jpg");

    let file = UploadFile::new("pie.jpg", b"JPEGDATA".to_vec()).with_content_type("image/jpeg");
    let link = storage.write(capability, &file).await.unwrap();
    assert_eq!(link, "https://cdn.example/pie.jpg");

    let uploads = state.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (content_type, body) = &uploads[0];
    assert!(content_type.as_deref().unwrap().starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(body);
    assert!(body.contains("name=\"key\""));
    assert!(body.contains("name=\"policy\""));
    assert!(body.contains("p0l1cy"));
    assert!(body.contains("name=\"file\"; filename=\"pie.jpg\""));
    assert!(body.contains("JPEGDATA"));
    let file_at = body.find("name=\"file\"").unwrap();
    assert!(body.find("name=\"key\"").unwrap() < file_at);
    assert!(body.find("name=\"policy\"").unwrap() < file_at);
}

#[tokio::test]
async fn test_denied_credential_is_none() {
    let state = start_server().await;
    let client = signed_client(&state);

    assert!(client.issue("denied.jpg").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_write_is_error() {
    let state = start_server().await;
    let client = signed_client(&state);
    let storage = HttpObjectStore::new().unwrap();

    let capability = client.issue("forbidden.jpg").await.unwrap().unwrap();
    let err = storage
        .write(capability, &UploadFile::new("forbidden.jpg", vec![1]))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::StorageRejected { status: 403 }));
    assert!(state.uploads.lock().unwrap().is_empty());
}
