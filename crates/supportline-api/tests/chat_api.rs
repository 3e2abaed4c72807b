use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use supportline_api::{AppStateInner, router};
use supportline_db::Database;
use supportline_types::api::Claims;
use supportline_types::{Message, ThreadSummary};

const SECRET: &str = "chat-api-test-secret";
const GREETING: &str = "Welcome to the course! Ask us anything.";

fn app() -> Router {
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.to_string(),
        greeting: GREETING.to_string(),
    });
    router(state)
}

fn token(user_id: Uuid, is_admin: bool) -> String {
    let claims = Claims {
        sub: user_id,
        username: if is_admin { "staff".into() } else { "student".into() },
        is_admin,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
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
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn chat_routes_require_a_valid_token() {
    let app = app();

    let (status, _) = call(&app, Method::GET, "/chat/list", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/chat/list", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn user_and_admin_converse_with_reply_and_read_state() {
    let app = app();
    let user_id = Uuid::new_v4();
    let user = token(user_id, false);
    let admin = token(Uuid::new_v4(), true);

    let (status, sent) = call(
        &app,
        Method::POST,
        "/chat/send",
        Some(&user),
        Some(json!({ "thread_id": user_id, "author_side": "user", "message": "Здравствуйте" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first: Message = serde_json::from_value(sent).unwrap();
    assert!(!first.read_by_admin);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/chat/mark_read",
        Some(&admin),
        Some(json!({ "thread_id": user_id, "is_admin": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        Method::POST,
        "/chat/send",
        Some(&admin),
        Some(json!({ "thread_id": user_id, "author_side": "admin", "message": "Добрый день!", "reply_to_id": first.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::GET, "/chat/list", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    let log: Vec<Message> = serde_json::from_value(body).unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].read_by_admin);
    assert!(log[0].read_by_user);
    assert_eq!(log[1].reply_to_id, Some(log[0].id));
    assert!(!log[1].read_by_user);
}

#[tokio::test]
async fn body_identity_fields_cannot_impersonate_the_author() {
    let app = app();
    let user_id = Uuid::new_v4();
    let user = token(user_id, false);
    let intruder_id = Uuid::new_v4();
    let intruder_admin = token(intruder_id, true);

    let (_, sent) = call(
        &app,
        Method::POST,
        "/chat/send",
        Some(&user),
        Some(json!({ "message": "my message" })),
    )
    .await;
    let msg: Message = serde_json::from_value(sent).unwrap();

    // The body claims to be the author; the session says otherwise.
    let (status, _) = call(
        &app,
        Method::POST,
        "/chat/edit",
        Some(&intruder_admin),
        Some(json!({ "message_id": msg.id, "message": "edited", "user_id": user_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        Method::POST,
        "/chat/delete",
        Some(&intruder_admin),
        Some(json!({ "message_id": msg.id, "user_id": user_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        Method::POST,
        "/chat/edit",
        Some(&user),
        Some(json!({ "message_id": msg.id, "message": "edited", "user_id": intruder_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "edited");
    assert!(!body["edited_at"].is_null());
}

#[tokio::test]
async fn author_side_in_body_is_advisory() {
    let app = app();
    let user_id = Uuid::new_v4();
    let user = token(user_id, false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/chat/send",
        Some(&user),
        Some(json!({ "author_side": "admin", "message": "pretending to be staff" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author_side"], "user");
    assert_eq!(body["author_id"], json!(user_id));
}

#[tokio::test]
async fn bodies_from_newer_clients_with_extra_fields_are_accepted() {
    let app = app();
    let user_id = Uuid::new_v4();
    let user = token(user_id, false);

    let (status, sent) = call(
        &app,
        Method::POST,
        "/chat/send",
        Some(&user),
        Some(json!({ "message": "hello", "user_id": "anna", "client_version": "2.1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, edited) = call(
        &app,
        Method::POST,
        "/chat/edit",
        Some(&user),
        Some(json!({ "message_id": sent["id"], "message": "hello again", "draft": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["body"], "hello again");
}

#[tokio::test]
async fn users_are_confined_to_their_own_thread() {
    let app = app();
    let user = token(Uuid::new_v4(), false);
    let someone_else = Uuid::new_v4();

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/chat/list?thread_id={}", someone_else),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::GET, "/chat/all_chats", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token(Uuid::new_v4(), true);
    let (status, _) = call(&app, Method::GET, "/chat/list", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = app();
    let user = token(Uuid::new_v4(), false);

    let (status, _) = call(&app, Method::POST, "/chat/send", Some(&user), Some(json!({ "message": "  " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = call(
        &app,
        Method::POST,
        "/chat/send",
        Some(&user),
        Some(json!({ "message": "", "file_url": "https://cdn/claim.pdf", "file_name": "claim.pdf", "file_type": "application/pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["attachment"]["kind"], "file");
    assert_eq!(body["attachment"]["name"], "claim.pdf");
}

#[tokio::test]
async fn react_toggles_per_actor_and_emoji() {
    let app = app();
    let user_id = Uuid::new_v4();
    let user = token(user_id, false);
    let admin = token(Uuid::new_v4(), true);

    let (_, sent) = call(&app, Method::POST, "/chat/send", Some(&user), Some(json!({ "message": "thanks" }))).await;
    let id = sent["id"].as_i64().unwrap();

    let (_, body) = call(&app, Method::POST, "/chat/react", Some(&admin), Some(json!({ "message_id": id, "reaction": "❤️" }))).await;
    assert_eq!(body["added"], true);
    let (_, body) = call(&app, Method::POST, "/chat/react", Some(&user), Some(json!({ "message_id": id, "reaction": "❤️" }))).await;
    assert_eq!(body["message"]["reactions"].as_array().unwrap().len(), 2);

    let (_, body) = call(&app, Method::POST, "/chat/react", Some(&admin), Some(json!({ "message_id": id, "reaction": "❤️" }))).await;
    assert_eq!(body["added"], false);
    let reactions = body["message"]["reactions"].as_array().unwrap();
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0]["user_id"], json!(user_id));

    let (status, _) = call(&app, Method::POST, "/chat/react", Some(&user), Some(json!({ "message_id": 4242, "reaction": "👍" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bootstrap_greets_only_an_empty_thread() {
    let app = app();
    let user_id = Uuid::new_v4();
    let user = token(user_id, false);

    let (status, body) = call(&app, Method::POST, "/chat/bootstrap", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"]["body"], GREETING);
    assert_eq!(body["created"]["author_side"], "admin");

    let (_, body) = call(&app, Method::POST, "/chat/bootstrap", Some(&user), None).await;
    assert!(body["created"].is_null());

    let (_, body) = call(&app, Method::GET, "/chat/list", Some(&user), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let admin = token(Uuid::new_v4(), true);
    let (status, _) = call(&app, Method::POST, "/chat/bootstrap", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn all_chats_reports_unread_counts_for_staff() {
    let app = app();
    let anna_id = Uuid::new_v4();
    let anna = token(anna_id, false);
    let admin = token(Uuid::new_v4(), true);

    call(&app, Method::POST, "/chat/send", Some(&anna), Some(json!({ "message": "one" }))).await;
    call(&app, Method::POST, "/chat/send", Some(&anna), Some(json!({ "message": "two" }))).await;

    let (status, body) = call(&app, Method::GET, "/chat/all_chats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let summaries: Vec<ThreadSummary> = serde_json::from_value(body).unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].thread_id, anna_id);
    assert_eq!(summaries[0].unread_count, 2);
    assert_eq!(summaries[0].last_message_preview, "two");
}
