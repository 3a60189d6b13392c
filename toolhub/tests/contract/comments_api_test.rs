//! コメントAPI Contract Tests
//!
//! POST/GET /api/tools/{id}/comments, PUT/DELETE /api/tools/{id}/comments/{cid},
//! POST/DELETE /api/tools/{id}/comments/{cid}/vote

use axum::http::StatusCode;
use serde_json::{json, Value};
use toolhub::common::auth::UserRole;

use crate::support::app::create_test_app;
use crate::support::http::{approved_tool, register_and_login, send, submit_tool, user_with_role};

fn content(text: &str) -> Option<Value> {
    Some(json!({ "content": text }))
}

async fn post_comment(app: &axum::Router, token: &str, tool_id: i64, text: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        &format!("/api/tools/{}/comments", tool_id),
        Some(token),
        content(text),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_comment_create_and_list() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;

    post_comment(&t.app, &alice, id, "First impressions are great").await;
    post_comment(&t.app, &bob, id, "Works fine on my laptop").await;

    let (status, body) = send(&t.app, "GET", &format!("/api/tools/{}/comments", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let comments = body.as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["username"], "bob");
    assert_eq!(comments[0]["upvotes"], 0);
    assert_eq!(comments[1]["content"], "First impressions are great");
}

#[tokio::test]
async fn test_comment_rules() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let approved = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let pending = submit_tool(&t.app, &alice, "btop", "development").await;

    let (status, _) = send(
        &t.app,
        "POST",
        &format!("/api/tools/{}/comments", approved),
        Some(&alice),
        content("too short"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/tools/{}/comments", pending),
        Some(&alice),
        content("Looks promising so far"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tool is not approved");
}

#[tokio::test]
async fn test_only_owner_edits() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let other = approved_tool(&t.app, &t.pool, &alice, "ncdu").await;
    let cid = post_comment(&t.app, &alice, id, "Original comment text").await;

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/tools/{}/comments/{}", id, cid),
        Some(&bob),
        content("Hijacked comment text"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to edit this comment");

    // 別ツールのパスからは見えない
    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/tools/{}/comments/{}", other, cid),
        Some(&alice),
        content("Edited through wrong tool"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/tools/{}/comments/{}", id, cid),
        Some(&alice),
        content("Edited comment text"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Edited comment text");
}

#[tokio::test]
async fn test_moderator_can_delete_with_reason() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let cid = post_comment(&t.app, &alice, id, "Comment to be removed").await;
    let uri = format!("/api/tools/{}/comments/{}", id, cid);

    let (status, body) = send(&t.app, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to delete this comment");

    let (status, _) = send(&t.app, "DELETE", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let details: String = sqlx::query_scalar(
        "SELECT details FROM audit_logs WHERE action = 'delete_comment'",
    )
    .fetch_one(&t.pool)
    .await
    .unwrap();
    let details: Value = serde_json::from_str(&details).unwrap();
    assert_eq!(details["reason"], "deleted by moderator");
}

#[tokio::test]
async fn test_voting_moves_counters() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let cid = post_comment(&t.app, &alice, id, "Vote on this comment").await;
    let vote_uri = format!("/api/tools/{}/comments/{}/vote", id, cid);

    let (status, body) = send(&t.app, "POST", &vote_uri, Some(&bob), Some(json!({ "vote": "up" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!((body["upvotes"].as_i64(), body["downvotes"].as_i64()), (Some(1), Some(0)));

    // 同じ票の繰り返しは変化なし
    let (_, body) = send(&t.app, "POST", &vote_uri, Some(&bob), Some(json!({ "vote": "up" }))).await;
    assert_eq!((body["upvotes"].as_i64(), body["downvotes"].as_i64()), (Some(1), Some(0)));

    let (_, body) = send(&t.app, "POST", &vote_uri, Some(&bob), Some(json!({ "vote": "down" }))).await;
    assert_eq!((body["upvotes"].as_i64(), body["downvotes"].as_i64()), (Some(0), Some(1)));

    let (status, _) = send(&t.app, "POST", &vote_uri, Some(&bob), Some(json!({ "vote": "sideways" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&t.app, "DELETE", &vote_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&t.app, "DELETE", &vote_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Vote not found");

    let (_, comments) = send(&t.app, "GET", &format!("/api/tools/{}/comments", id), None, None).await;
    assert_eq!(comments[0]["upvotes"], 0);
    assert_eq!(comments[0]["downvotes"], 0);
}
