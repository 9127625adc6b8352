/// Integration test: drive the router end to end against an in-memory
/// store, from registration through sending a card and chatting.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use thiep_api::auth::AppStateInner;
use thiep_core::identity::LocalIdentity;
use thiep_core::relay::DisabledNotifier;
use thiep_core::send::CardSender;
use thiep_core::store::SqliteDirectory;
use thiep_db::Database;

const SECRET: &str = "integration-secret";

fn app() -> Router {
    app_with_db().0
}

fn app_with_db() -> (Router, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let directory = Arc::new(SqliteDirectory::new(db.clone()));
    let state = Arc::new(AppStateInner {
        directory: directory.clone(),
        identity: LocalIdentity::new(db.clone()),
        sender: CardSender::new(directory, Arc::new(DisabledNotifier), "https://thiep.example".into()),
        jwt_secret: SECRET.into(),
    });
    (thiep_api::router(state), db)
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn register(app: &Router, username: &str, name: &str) -> (String, String) {
    let (status, body) = call(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "password": "snowfall-2025",
            "display_name": name,
            "email": format!("{username}@example.com"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["user_id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn card_reaches_its_recipient() {
    let app = app();
    let (_minh_id, minh) = register(&app, "minh", "Minh").await;
    let (lan_id, lan) = register(&app, "lan", "Lan").await;

    let (status, friends) = call(&app, "GET", "/users", Some(&minh), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(friends["friends"].as_array().unwrap().len(), 1);

    let (status, sent) = call(
        &app,
        "POST",
        "/cards",
        Some(&minh),
        Some(json!({
            "message": "Giáng sinh an lành",
            "stickers": [{ "id": "s1", "glyph": "🎄", "x": 40.0, "y": 60.0 }],
            "selected_friend_id": lan_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let card_id = sent["card"]["id"].as_str().unwrap().to_string();
    assert_eq!(sent["share_link"], format!("https://thiep.example/?card={card_id}"));
    assert_eq!(sent["card"]["recipient"]["name"], "Lan");

    let (_, received) = call(&app, "GET", "/cards/received", Some(&lan), None).await;
    assert_eq!(received["cards"][0]["id"], card_id);
    assert!(received["notice"].is_null());

    let (_, mine) = call(&app, "GET", "/cards/sent", Some(&minh), None).await;
    assert_eq!(mine["cards"].as_array().unwrap().len(), 1);

    // Shared links work without a token.
    let (status, card) = call(&app, "GET", &format!("/cards/{card_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card["message"], "Giáng sinh an lành");
}

#[tokio::test]
async fn failures_map_to_statuses() {
    let app = app();
    let (_, minh) = register(&app, "minh", "Minh").await;

    let (status, body) = call(&app, "POST", "/cards", Some(&minh), Some(json!({ "message": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Hãy viết lời chúc nhé!");

    let (status, _) = call(&app, "GET", "/cards/sent", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "minh", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", "/cards/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_token_can_send_public_cards() {
    let app = app();
    let (status, auth) = call(&app, "POST", "/auth/anonymous", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(auth["anonymous"], true);
    let token = auth["token"].as_str().unwrap();

    let (status, sent) = call(&app, "POST", "/cards", Some(token), Some(json!({ "message": "Hello" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["card"]["author_name"], "Người bí ẩn");
    assert!(sent["card"]["recipient"].is_null());
}

#[tokio::test]
async fn both_sides_share_one_thread() {
    let app = app();
    let (minh_id, minh) = register(&app, "minh", "Minh").await;
    let (lan_id, lan) = register(&app, "lan", "Lan").await;

    let (status, message) = call(
        &app,
        "POST",
        &format!("/chat/{lan_id}/messages"),
        Some(&minh),
        Some(json!({ "text": "Chào Lan" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["sender_name"], "Minh");

    let (status, messages) = call(&app, "GET", &format!("/chat/{minh_id}/messages"), Some(&lan), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages[0]["text"], "Chào Lan");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/chat/{minh_id}/messages"),
        Some(&lan),
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_fails_when_profile_cannot_be_stored() {
    let (app, db) = app_with_db();
    register(&app, "minh", "Minh").await;
    db.with_conn(|conn| {
        conn.execute_batch(
            "CREATE TRIGGER users_frozen BEFORE INSERT ON users
             BEGIN SELECT RAISE(ABORT, 'users frozen'); END;",
        )?;
        Ok(())
    })
    .unwrap();

    let (status, body) = call(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "username": "minh", "password": "snowfall-2025" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Không thể lưu, vui lòng thử lại.");
    assert!(body["token"].is_null());
}
