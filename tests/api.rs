// Integration tests for the HTTP surface, backed by the in-memory store.
//
// These tests verify:
// - one vote per user per poll, with tallies unchanged by a rejected ballot
// - private polls and their results are owner-only
// - owner and administrator delete paths
// - authentication and validation failures map to the right statuses
// - undecodable bodies and path segments still get a JSON error body

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use pollhub::config::Config;
use pollhub::store::MemoryStore;
use pollhub::{build_state, routes};

async fn app() -> Router {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("POLLHUB_STORAGE", "memory"),
        ("JWT_SECRET", "test-secret"),
        ("ADMIN_USERNAME", "root"),
        ("ADMIN_EMAIL", "root@example.com"),
        ("ADMIN_PASSWORD", "rootpass"),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    let state = build_state(Arc::new(MemoryStore::new()), &config)
        .await
        .unwrap();
    routes::create_router(state, None)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register_and_login(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "password1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    login(app, username, "password1").await
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn create_poll(app: &Router, token: &str, title: &str, is_public: bool) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/polls",
        Some(token),
        Some(json!({
            "title": title,
            "description": "Team lunch",
            "isPublic": is_public,
            "options": [{ "text": "Pizza" }, { "text": "Salad" }],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

fn option_id(poll: &Value, index: usize) -> String {
    poll["options"][index]["id"].as_str().unwrap().to_string()
}

fn counts(results: &Value) -> Vec<(String, i64)> {
    results["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["text"].as_str().unwrap().to_string(),
                r["voteCount"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn lunch_poll_counts_one_vote_per_user() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;
    let carol = register_and_login(&app, "carol").await;

    let poll = create_poll(&app, &alice, "Lunch?", true).await;
    let id = poll["id"].as_str().unwrap();
    assert_eq!(poll["createdBy"], "alice");
    let pizza = option_id(&poll, 0);
    let salad = option_id(&poll, 1);
    let vote_uri = format!("/api/polls/{id}/vote");

    for voter in [&bob, &carol] {
        let (status, _) = send(&app, "POST", &vote_uri, Some(voter), Some(json!({ "optionId": pizza }))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let results_uri = format!("/api/polls/{id}/results");
    let (status, results) = send(&app, "GET", &results_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        counts(&results),
        vec![("Pizza".to_string(), 2), ("Salad".to_string(), 0)]
    );
    assert_eq!(results["totalVotes"], 2);

    let (status, body) = send(&app, "POST", &vote_uri, Some(&bob), Some(json!({ "optionId": salad }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["message"], "you have already voted on this poll");

    let (_, after) = send(&app, "GET", &results_uri, None, None).await;
    assert_eq!(counts(&after), counts(&results));

    let (status, votes) = send(&app, "GET", "/api/users/me/votes", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(votes.as_array().unwrap().len(), 1);
    assert_eq!(votes[0]["optionText"], "Pizza");
    assert_eq!(votes[0]["pollTitle"], "Lunch?");

    let (status, ballots) = send(&app, "GET", &format!("/api/polls/{id}/votes"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ballots = ballots.as_array().unwrap();
    assert_eq!(ballots.len(), 2);
    for ballot in ballots {
        assert_eq!(ballot["optionText"], "Pizza");
        assert!(ballot.get("voter").is_none(), "{ballot}");
        assert!(ballot.get("userId").is_none(), "{ballot}");
    }
}

#[tokio::test]
async fn option_from_another_poll_is_not_found() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;
    let lunch = create_poll(&app, &alice, "Lunch?", true).await;
    let dinner = create_poll(&app, &alice, "Dinner?", true).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/polls/{}/vote", lunch["id"].as_str().unwrap()),
        Some(&alice),
        Some(json!({ "optionId": option_id(&dinner, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "option not found");
}

#[tokio::test]
async fn private_polls_are_owner_only() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    let poll = create_poll(&app, &alice, "Secret", false).await;
    let id = poll["id"].as_str().unwrap();

    for uri in [format!("/api/polls/{id}"), format!("/api/polls/{id}/results")] {
        let (status, body) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "authentication required");

        let (status, body) = send(&app, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "you are not the poll creator");

        let (status, _) = send(&app, "GET", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, public) = send(&app, "GET", "/api/polls/public", None, None).await;
    assert!(public.as_array().unwrap().is_empty());

    let (_, seen_by_bob) = send(&app, "GET", "/api/users/alice/polls", Some(&bob), None).await;
    assert!(seen_by_bob.as_array().unwrap().is_empty());

    let (_, seen_by_alice) = send(&app, "GET", "/api/users/alice/polls", Some(&alice), None).await;
    assert_eq!(seen_by_alice.as_array().unwrap().len(), 1);

    let (_, mine) = send(&app, "GET", "/api/users/me/polls", Some(&alice), None).await;
    assert_eq!(mine[0]["isPublic"], false);
}

#[tokio::test]
async fn owner_can_delete_and_strangers_cannot() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;

    let poll = create_poll(&app, &alice, "Lunch?", true).await;
    let uri = format!("/api/polls/{}", poll["id"].as_str().unwrap());

    let (status, _) = send(&app, "POST", &format!("{uri}/vote"), Some(&bob), Some(json!({ "optionId": option_id(&poll, 0) }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, votes) = send(&app, "GET", "/api/users/me/votes", Some(&bob), None).await;
    assert!(votes.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_path_bypasses_ownership() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;
    let bob = register_and_login(&app, "bob").await;
    let root = login(&app, "root", "rootpass").await;

    let poll = create_poll(&app, &alice, "Secret", false).await;
    let admin_uri = format!("/admin/polls/{}", poll["id"].as_str().unwrap());

    let (status, body) = send(&app, "DELETE", &admin_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "administrator role required");

    let (status, _) = send(&app, "DELETE", &admin_uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "DELETE", &admin_uri, Some(&root), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_require_a_valid_token() {
    let app = app().await;
    let payload = json!({ "title": "Lunch?", "options": [{ "text": "Pizza" }] });

    let (status, body) = send(&app, "POST", "/api/polls", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = send(&app, "POST", "/api/polls", Some("garbage"), Some(payload)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/users/me/votes", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_and_duplicates_are_rejected() {
    let app = app().await;
    register_and_login(&app, "alice").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "nope-nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "username": "ALICE", "email": "x@example.com", "password": "password1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "username is already in use");

    let (status, body) = send(&app, "GET", "/api/users/username/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn malformed_polls_are_validation_errors() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;

    for payload in [
        json!({ "title": "   ", "options": [{ "text": "Pizza" }] }),
        json!({ "title": "Lunch?", "options": [] }),
        json!({ "title": "Lunch?" }),
    ] {
        let (status, body) = send(&app, "POST", "/api/polls", Some(&alice), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    let (_, mine) = send(&app, "GET", "/api/users/me/polls", Some(&alice), None).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn undecodable_requests_render_structured_errors() {
    let app = app().await;
    let alice = register_and_login(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/polls",
        Some(&alice),
        Some(json!({ "options": [{ "text": "Pizza" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert!(body["message"].as_str().unwrap().contains("title"), "{body}");

    let (status, body) = send(&app, "GET", "/api/polls/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");

    let poll = create_poll(&app, &alice, "Lunch?", true).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/polls/{}/vote", poll["id"].as_str().unwrap()),
        Some(&alice),
        Some(json!({ "optionId": "pizza" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn unknown_poll_is_not_found() {
    let app = app().await;
    let (status, body) = send(
        &app,
        "GET",
        "/api/polls/00000000-0000-0000-0000-000000000000/results",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "poll not found");

    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
