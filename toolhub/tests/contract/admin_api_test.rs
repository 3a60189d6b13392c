//! 管理API Contract Tests
//!
//! /api/admin/tools, /api/admin/tools/pending, /api/admin/tools/{id}/approve,
//! /api/admin/users, /api/admin/users/{id}/role, /api/admin/audit-logs,
//! /api/admin/stats/overview, /api/admin/statistics

use axum::http::StatusCode;
use serde_json::json;
use toolhub::common::auth::UserRole;

use crate::support::app::create_test_app;
use crate::support::http::{moderate, register_and_login, send, submit_tool, user_with_role};

#[tokio::test]
async fn test_role_gates() {
    let t = create_test_app().await;
    let user = register_and_login(&t.app, "alice").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;

    let (status, body) = send(&t.app, "GET", "/api/admin/tools", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Moderator access required");

    let (status, _) = send(&t.app, "GET", "/api/admin/tools", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);

    for uri in ["/api/admin/users", "/api/admin/audit-logs"] {
        let (status, body) = send(&t.app, "GET", uri, Some(&moderator), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");
    }
}

#[tokio::test]
async fn test_approve_and_reject() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let id = submit_tool(&t.app, &alice, "btop", "development").await;

    let (status, pending) = send(&t.app, "GET", "/api/admin/tools/pending", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, body) = moderate(&t.app, &moderator, id, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["rejection_reason"], "Not a tool");
    assert!(body["approved_by"].is_i64());

    let (_, body) = moderate(&t.app, &moderator, id, true).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["rejection_reason"], serde_json::Value::Null);

    let (_, pending) = send(&t.app, "GET", "/api/admin/tools/pending", Some(&moderator), None).await;
    assert!(pending.as_array().unwrap().is_empty());

    let (status, _) = moderate(&t.app, &moderator, 999, true).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let actions: Vec<String> = sqlx::query_scalar(
        "SELECT action FROM audit_logs WHERE entity_type = 'tool' AND entity_id = ? ORDER BY id",
    )
    .bind(id)
    .fetch_all(&t.pool)
    .await
    .unwrap();
    assert_eq!(actions, vec!["create", "reject", "approve"]);
}

#[tokio::test]
async fn test_admin_tool_filters() {
    let t = create_test_app().await;
    let alice = register_and_login(&t.app, "alice").await;
    let bob = register_and_login(&t.app, "bob").await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let approved = submit_tool(&t.app, &alice, "figma", "design").await;
    moderate(&t.app, &moderator, approved, true).await;
    submit_tool(&t.app, &bob, "penpot", "design").await;
    submit_tool(&t.app, &bob, "jq", "development").await;

    let (_, body) = send(&t.app, "GET", "/api/admin/tools?status=pending", Some(&moderator), None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = send(&t.app, "GET", "/api/admin/tools?category=design", Some(&moderator), None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, me) = send(&t.app, "GET", "/api/auth/me", Some(&bob), None).await;
    let (_, body) = send(
        &t.app,
        "GET",
        &format!("/api/admin/tools?created_by={}", me["id"]),
        Some(&moderator),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, _) = send(&t.app, "GET", "/api/admin/tools?status=archived", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_role_change() {
    let t = create_test_app().await;
    let admin = user_with_role(&t.app, &t.pool, "root", UserRole::Admin).await;
    register_and_login(&t.app, "alice").await;
    let (_, users) = send(&t.app, "GET", "/api/admin/users?role=user", Some(&admin), None).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    let alice_id = users[0]["id"].as_i64().unwrap();

    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/admin/users/{}/role", alice_id),
        Some(&admin),
        Some(json!({ "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "moderator");

    let (_, me) = send(&t.app, "GET", "/api/auth/me", Some(&admin), None).await;
    let (status, body) = send(
        &t.app,
        "PUT",
        &format!("/api/admin/users/{}/role", me["id"]),
        Some(&admin),
        Some(json!({ "role": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot change your own role");

    let (status, _) = send(
        &t.app,
        "PUT",
        "/api/admin/users/999/role",
        Some(&admin),
        Some(json!({ "role": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/admin/users/{}/role", alice_id),
        Some(&admin),
        Some(json!({ "role": "superuser" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, logs) = send(
        &t.app,
        "GET",
        "/api/admin/audit-logs?action=change_role",
        Some(&admin),
        None,
    )
    .await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["details"]["old_role"], "user");
    assert_eq!(logs[0]["details"]["new_role"], "moderator");
    assert_eq!(logs[0]["username"], "root");
}

#[tokio::test]
async fn test_audit_logs_newest_first() {
    let t = create_test_app().await;
    let admin = user_with_role(&t.app, &t.pool, "root", UserRole::Admin).await;
    register_and_login(&t.app, "alice").await;

    let (status, logs) = send(&t.app, "GET", "/api/admin/audit-logs?limit=2", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["action"], "login");
    assert_eq!(logs[0]["username"], "alice");
    assert_eq!(logs[1]["action"], "register");

    let (_, logs) = send(
        &t.app,
        "GET",
        "/api/admin/audit-logs?entity_type=user&action=register",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(logs.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stats_overview_and_statistics() {
    let t = create_test_app().await;
    let moderator = user_with_role(&t.app, &t.pool, "moddy", UserRole::Moderator).await;
    let alice = register_and_login(&t.app, "alice").await;
    submit_tool(&t.app, &alice, "btop", "development").await;

    let (status, overview) = send(&t.app, "GET", "/api/admin/stats/overview", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["users"]["total"], 2);
    assert_eq!(overview["users"]["by_role"]["moderator"], 1);
    assert_eq!(overview["users"]["with_2fa"], 0);
    assert_eq!(overview["tools"]["by_status"]["pending"], 1);
    assert_eq!(overview["feedback"]["ratings"], 0);
    assert!(overview["activity"]["total_actions"].as_i64().unwrap() >= 5);
    assert_eq!(
        overview["activity"]["recent_actions"],
        overview["activity"]["total_actions"]
    );

    let (status, stats) = send(&t.app, "GET", "/api/admin/statistics", Some(&moderator), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users_by_role"][0], json!({ "role": "user", "count": 1 }));
    assert_eq!(stats["tools_by_status"][0], json!({ "status": "pending", "count": 1 }));
    assert_eq!(stats["tools_by_category"].as_array().unwrap().len(), 6);
    assert!(!stats["recent_activity"].as_array().unwrap().is_empty());
}
