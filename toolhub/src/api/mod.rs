//! REST APIルーター
//!
//! `/api/auth`、`/api/tools`、`/api/admin`と`/health`を組み立てる。
//! 同じパスで公開・要認証のメソッドが混在する場合は、認証付きのルーターを
//! 別に作ってマージする。

pub mod admin;
pub mod auth;
pub mod comments;
pub mod error;
pub mod ratings;
pub mod tools;

use crate::auth::middleware::{jwt_auth_middleware, pending_auth_middleware, require_role_middleware};
use crate::common::auth::UserRole;
use crate::AppState;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// CORSを全許可したアプリケーションを作成
pub fn create_app(state: AppState) -> Router {
    create_app_with_cors(state, &["*".to_string()])
}

/// APIルーターを作成
///
/// # Arguments
/// * `state` - アプリケーション状態
/// * `cors_origins` - 許可するオリジン（`*`を含めば全許可）
pub fn create_app_with_cors(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/auth", auth_routes(&state))
        .nest("/api/tools", tool_routes(&state))
        .nest("/api/admin", admin_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o.trim() == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin: {}", e);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let pending = Router::new()
        .route("/verify-2fa", post(auth::verify_two_factor))
        .route_layer(from_fn_with_state(state.clone(), pending_auth_middleware));

    let protected = Router::new()
        .route("/me", get(auth::me))
        .route("/enable-2fa", post(auth::enable_two_factor))
        .route("/disable-2fa", post(auth::disable_two_factor))
        .route("/change-password", post(auth::change_password))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    public.merge(pending).merge(protected)
}

fn tool_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(tools::list_tools))
        .route("/search", get(tools::search_tools))
        .route("/stats", get(tools::tool_stats))
        .route("/{id}", get(tools::get_tool))
        .route("/{id}/ratings", get(ratings::list_ratings))
        .route("/{id}/ratings/stats", get(ratings::rating_stats))
        .route("/{id}/comments", get(comments::list_comments));

    let protected = Router::new()
        .route("/", post(tools::create_tool))
        .route("/my", get(tools::my_tools))
        .route("/{id}", put(tools::update_tool).delete(tools::delete_tool))
        .route(
            "/{id}/rate",
            post(ratings::rate_tool).delete(ratings::delete_rating),
        )
        .route("/{id}/my-rating", get(ratings::my_rating))
        .route("/{id}/comments", post(comments::create_comment))
        .route(
            "/{id}/comments/{cid}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(
            "/{id}/comments/{cid}/vote",
            post(comments::vote_comment).delete(comments::remove_vote),
        )
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    public.merge(protected)
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    let moderator = Router::new()
        .route("/tools", get(admin::list_tools))
        .route("/tools/pending", get(admin::pending_tools))
        .route("/tools/{id}/approve", post(admin::approve_tool))
        .route("/stats/overview", get(admin::stats_overview))
        .route("/statistics", get(admin::statistics))
        .route_layer(from_fn_with_state(UserRole::Moderator, require_role_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let admin_only = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", put(admin::change_role))
        .route("/audit-logs", get(admin::audit_logs))
        .route_layer(from_fn_with_state(UserRole::Admin, require_role_middleware))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    moderator.merge(admin_only)
}
