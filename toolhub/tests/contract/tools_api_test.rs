//! ツールAPI Contract Tests
//!
//! POST/GET /api/tools, GET /api/tools/search, GET /api/tools/stats,
//! GET /api/tools/my, GET/PUT/DELETE /api/tools/{id}

use axum::http::StatusCode;
use serde_json::json;
use toolhub::common::auth::UserRole;

use crate::support::app::create_test_app;
use crate::support::http::{
    approved_tool, moderate, register_and_login, send, submit_tool, user_with_role,
};

// ---------------------------------------------------------------------------
// POST /api/tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submitted_tool_starts_pending() {
    let t = create_test_app().await;
    let token = register_and_login(&t.app, "alice").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/tools",
        Some(&token),
        Some(json!({
            "name": "ripgrep",
            "description": "Recursive regex search tool",
            "category": "development",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["created_by_username"], "alice");
    assert_eq!(body["average_rating"], 0.0);
    assert_eq!(body["total_ratings"], 0);
}

#[tokio::test]
async fn test_submission_validation() {
    let t = create_test_app().await;
    let token = register_and_login(&t.app, "alice").await;

    for payload in [
        json!({ "name": "", "description": "Recursive regex search", "category": "development" }),
        json!({ "name": "rg", "description": "too short", "category": "development" }),
        json!({ "name": "rg", "description": "Recursive regex search", "category": "games" }),
        json!({ "name": "rg", "description": "Recursive regex search", "category": "other",
                "url": "u".repeat(501) }),
    ] {
        let (status, _) = send(&t.app, "POST", "/api/tools", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

// ---------------------------------------------------------------------------
// GET /api/tools
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_public_list_shows_only_approved() {
    let t = create_test_app().await;
    let token = register_and_login(&t.app, "alice").await;
    approved_tool(&t.app, &t.pool, &token, "htop").await;
    submit_tool(&t.app, &token, "btop", "development").await;

    let (status, body) = send(&t.app, "GET", "/api/tools", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    assert_eq!(body["tools"][0]["name"], "htop");
}

#[tokio::test]
async fn test_list_filters_by_category_and_paginates() {
    let t = create_test_app().await;
    let token = register_and_login(&t.app, "alice").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    for (name, category) in [("figma", "design"), ("penpot", "design"), ("jq", "development")] {
        let id = submit_tool(&t.app, &token, name, category).await;
        moderate(&t.app, &moderator, id, true).await;
    }

    let (_, body) = send(&t.app, "GET", "/api/tools?category=design", None, None).await;
    assert_eq!(body["total"], 2);

    let (_, body) = send(&t.app, "GET", "/api/tools?skip=1&limit=1", None, None).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["tools"].as_array().unwrap().len(), 1);

    let (status, _) = send(&t.app, "GET", "/api/tools?category=games", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// GET /api/tools/search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_search_matches_name_and_description() {
    let t = create_test_app().await;
    let token = register_and_login(&t.app, "alice").await;
    approved_tool(&t.app, &t.pool, &token, "htop").await;
    approved_tool(&t.app, &t.pool, &token, "ncdu").await;

    let (status, body) = send(&t.app, "GET", "/api/tools/search?q=ncd", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "ncdu");

    // 説明文 "{name} makes everyday work faster" にも一致する
    let (_, body) = send(&t.app, "GET", "/api/tools/search?q=everyday", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = send(&t.app, "GET", "/api/tools/search?q=", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// GET /api/tools/stats, GET /api/tools/my
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stats_and_my_tools() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    approved_tool(&t.app, &t.pool, &alice, "htop").await;
    submit_tool(&t.app, &alice, "btop", "productivity").await;
    submit_tool(&t.app, &bob, "glances", "analytics").await;

    let (status, stats) = send(&t.app, "GET", "/api/tools/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["by_status"]["approved"], 1);
    assert_eq!(stats["by_status"]["pending"], 2);
    assert_eq!(stats["by_category"]["analytics"], 1);
    assert_eq!(stats["by_category"]["design"], 0);

    let (status, mine) = send(&t.app, "GET", "/api/tools/my", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"htop") && names.contains(&"btop"));
}

// ---------------------------------------------------------------------------
// GET /api/tools/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_pending_tool_visibility() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let id = submit_tool(&t.app, &alice, "btop", "development").await;
    let uri = format!("/api/tools/{}", id);

    assert_eq!(send(&t.app, "GET", &uri, None, None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&t.app, "GET", &uri, Some(&bob), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(send(&t.app, "GET", &uri, Some(&alice), None).await.0, StatusCode::OK);
    assert_eq!(send(&t.app, "GET", &uri, Some(&moderator), None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_detail_includes_feedback_summary() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    send(
        &t.app,
        "POST",
        &format!("/api/tools/{}/rate", id),
        Some(&alice),
        Some(json!({ "rating": 4 })),
    )
    .await;

    let (status, anonymous) = send(&t.app, "GET", &format!("/api/tools/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anonymous["average_rating"], 4.0);
    assert_eq!(anonymous["rating_distribution"]["4"], 1);
    assert_eq!(anonymous["rating_distribution"]["1"], 0);
    assert_eq!(anonymous["user_rating"], serde_json::Value::Null);
    assert_eq!(anonymous["total_comments"], 0);

    let (_, own) = send(&t.app, "GET", &format!("/api/tools/{}", id), Some(&alice), None).await;
    assert_eq!(own["user_rating"], 4);
}

#[tokio::test]
async fn test_unknown_tool_is_404() {
    let t = create_test_app().await;
    let (status, body) = send(&t.app, "GET", "/api/tools/999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tool not found");
}

// ---------------------------------------------------------------------------
// PUT /api/tools/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_creator_edit_returns_tool_to_review() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/tools/{}", id),
        Some(&alice),
        Some(json!({ "description": "Interactive process viewer for Unix" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["name"], "htop");
    assert_eq!(body["description"], "Interactive process viewer for Unix");
}

#[tokio::test]
async fn test_empty_url_clears_link() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let id = submit_tool(&t.app, &alice, "htop", "development").await;
    let uri = format!("/api/tools/{}", id);

    let (status, body) = send(&t.app, "PUT", &uri, Some(&alice), Some(json!({ "name": "htop2" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://example.com/htop");

    let (status, body) = send(&t.app, "PUT", &uri, Some(&alice), Some(json!({ "url": "" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].is_null());
    assert_eq!(body["name"], "htop2");
}

#[tokio::test]
async fn test_admin_edit_keeps_status() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let admin = user_with_role(&t.app, &t.pool, "root", UserRole::Admin).await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/tools/{}", id),
        Some(&admin),
        Some(json!({ "category": "productivity" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["category"], "productivity");
}

#[tokio::test]
async fn test_other_users_cannot_edit_or_delete() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let id = submit_tool(&t.app, &alice, "btop", "development").await;
    let uri = format!("/api/tools/{}", id);

    let (status, body) = send(&t.app, "PUT", &uri, Some(&bob), Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to update this tool");

    let (status, body) = send(&t.app, "DELETE", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized to delete this tool");
}

// ---------------------------------------------------------------------------
// DELETE /api/tools/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delete_cascades_and_is_audited() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let id = approved_tool(&t.app, &t.pool, &alice, "htop").await;
    send(
        &t.app,
        "POST",
        &format!("/api/tools/{}/comments", id),
        Some(&alice),
        Some(json!({ "content": "Great replacement for top" })),
    )
    .await;

    let (status, _) = send(&t.app, "DELETE", &format!("/api/tools/{}", id), Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&t.app, "GET", &format!("/api/tools/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tool_comments")
        .fetch_one(&t.pool)
        .await
        .unwrap();
    assert_eq!(comments, 0);

    let details: String = sqlx::query_scalar(
        "SELECT details FROM audit_logs WHERE action = 'delete' AND entity_type = 'tool'",
    )
    .fetch_one(&t.pool)
    .await
    .unwrap();
    let details: serde_json::Value = serde_json::from_str(&details).unwrap();
    assert_eq!(details["name"], "htop");
}
