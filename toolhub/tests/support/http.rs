use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use toolhub::common::auth::UserRole;
use tower::ServiceExt;

/// テストユーザー共通のパスワード
pub const PASSWORD: &str = "password123";

/// JSONリクエストを送り、ステータスとJSONボディを返す（空ボディはNull）
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// ユーザー登録
pub async fn register(app: &Router, username: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
        })),
    )
    .await
}

/// ログインしてレスポンスを返す
pub async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

/// 登録してアクセストークンを得る
pub async fn register_and_login(app: &Router, username: &str) -> String {
    let (status, _) = register(app, username).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = login(app, username, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

/// 指定ロールのユーザーを作成してトークンを得る
#[allow(dead_code)]
pub async fn user_with_role(app: &Router, pool: &SqlitePool, username: &str, role: UserRole) -> String {
    let (status, body) = register(app, username).await;
    assert_eq!(status, StatusCode::CREATED);
    toolhub::db::users::update_role(pool, body["id"].as_i64().unwrap(), role)
        .await
        .unwrap();
    let (status, body) = login(app, username, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

/// ツールを投稿してIDを返す
#[allow(dead_code)]
pub async fn submit_tool(app: &Router, token: &str, name: &str, category: &str) -> i64 {
    let (status, body) = send(
        app,
        "POST",
        "/api/tools",
        Some(token),
        Some(json!({
            "name": name,
            "description": format!("{} makes everyday work faster", name),
            "category": category,
            "url": format!("https://example.com/{}", name),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_i64().unwrap()
}

/// ツールを承認・却下する
#[allow(dead_code)]
pub async fn moderate(app: &Router, moderator_token: &str, tool_id: i64, approved: bool) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/api/admin/tools/{}/approve", tool_id),
        Some(moderator_token),
        Some(json!({ "approved": approved, "reason": if approved { None } else { Some("Not a tool") } })),
    )
    .await
}

/// 投稿して承認済みにしたツールのIDを返す
#[allow(dead_code)]
pub async fn approved_tool(app: &Router, pool: &SqlitePool, owner_token: &str, name: &str) -> i64 {
    let tool_id = submit_tool(app, owner_token, name, "development").await;
    let moderator = user_with_role(app, pool, &format!("mod-{}", name), UserRole::Moderator).await;
    let (status, _) = moderate(app, &moderator, tool_id, true).await;
    assert_eq!(status, StatusCode::OK);
    tool_id
}
