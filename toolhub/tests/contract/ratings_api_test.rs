//! 評価API Contract Tests
//!
//! POST/DELETE /api/tools/{id}/rate, GET /api/tools/{id}/my-rating,
//! GET /api/tools/{id}/ratings/stats, GET /api/tools/{id}/ratings

use axum::http::StatusCode;
use serde_json::{json, Value};
use toolhub::common::auth::UserRole;

use crate::support::app::create_test_app;
use crate::support::http::{approved_tool, register_and_login, send, submit_tool, user_with_role};

fn rate_body(rating: i64) -> Option<Value> {
    Some(json!({ "rating": rating }))
}

#[tokio::test]
async fn test_rating_upserts_per_user() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let rate_uri = format!("/api/tools/{}/rate", id);

    let (status, body) = send(&t.app, "POST", &rate_uri, Some(&alice), rate_body(5)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["rating"], 5);
    send(&t.app, "POST", &rate_uri, Some(&alice), rate_body(3)).await;
    send(&t.app, "POST", &rate_uri, Some(&bob), rate_body(4)).await;

    let (status, stats) = send(
        &t.app,
        "GET",
        &format!("/api/tools/{}/ratings/stats", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_ratings"], 2);
    assert_eq!(stats["average_rating"], 3.5);
    assert_eq!(stats["rating_distribution"]["3"], 1);
    assert_eq!(stats["rating_distribution"]["4"], 1);
    assert_eq!(stats["rating_distribution"]["5"], 0);

    let actions: Vec<String> = sqlx::query_scalar(
        "SELECT action FROM audit_logs WHERE entity_type = 'rating' ORDER BY id",
    )
    .fetch_all(&t.pool)
    .await
    .unwrap();
    assert_eq!(actions, vec!["create_rating", "update_rating", "create_rating"]);
}

#[tokio::test]
async fn test_rating_rules() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let approved = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let pending = submit_tool(&t.app, &alice, "btop", "development").await;

    for value in [0, 6] {
        let (status, _) = send(
            &t.app,
            "POST",
            &format!("/api/tools/{}/rate", approved),
            Some(&alice),
            rate_body(value),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/tools/{}/rate", pending),
        Some(&alice),
        rate_body(4),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Tool is not approved");

    let (status, _) = send(&t.app, "POST", "/api/tools/999/rate", Some(&alice), rate_body(4)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        "POST",
        &format!("/api/tools/{}/rate", approved),
        None,
        rate_body(4),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_my_rating_and_delete() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let my_uri = format!("/api/tools/{}/my-rating", id);
    let rate_uri = format!("/api/tools/{}/rate", id);

    let (status, body) = send(&t.app, "GET", &my_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], Value::Null);

    send(&t.app, "POST", &rate_uri, Some(&alice), rate_body(2)).await;
    let (_, body) = send(&t.app, "GET", &my_uri, Some(&alice), None).await;
    assert_eq!(body["rating"], 2);

    let (status, _) = send(&t.app, "DELETE", &rate_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&t.app, "DELETE", &rate_uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Rating not found");

    let (_, body) = send(&t.app, "GET", &my_uri, Some(&alice), None).await;
    assert_eq!(body["rating"], Value::Null);
}

#[tokio::test]
async fn test_ratings_list_newest_first() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    let rate_uri = format!("/api/tools/{}/rate", id);
    send(&t.app, "POST", &rate_uri, Some(&alice), rate_body(5)).await;
    send(&t.app, "POST", &rate_uri, Some(&bob), rate_body(1)).await;

    let (status, body) = send(&t.app, "GET", &format!("/api/tools/{}/ratings", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let ratings = body.as_array().unwrap();
    assert_eq!(ratings.len(), 2);
    assert_eq!(ratings[0]["username"], "bob");
    assert_eq!(ratings[1]["username"], "alice");

    let (_, body) = send(
        &t.app,
        "GET",
        &format!("/api/tools/{}/ratings?limit=1", id),
        None,
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_feedback_on_pending_tool_is_hidden_from_public() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let id = submit_tool(&t.app, &alice, "btop", "development").await;

    for uri in [
        format!("/api/tools/{}/ratings", id),
        format!("/api/tools/{}/ratings/stats", id),
        format!("/api/tools/{}/comments", id),
    ] {
        let (status, body) = send(&t.app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], "Tool not found");

        let (status, _) = send(&t.app, "GET", &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);

        let (status, _) = send(&t.app, "GET", &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        let (status, _) = send(&t.app, "GET", &uri, Some(&moderator), None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
    }

    // 権限のある閲覧で作られたキャッシュも匿名には返さない
    let (status, _) = send(&t.app, "GET", &format!("/api/tools/{}/ratings/stats", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
