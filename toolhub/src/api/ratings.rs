//! 評価API
//!
//! `/api/tools/{id}` 配下の評価登録・取消・統計

use super::error::into_response;
use super::tools::{load_approved_tool, load_visible_tool};
use crate::audit::{actions, EntityType};
use crate::cache::{self, keys};
use crate::common::auth::User;
use crate::common::catalog::{RatingStats, MAX_RATING, MIN_RATING};
use crate::common::error::HubError;
use crate::common::pagination::{PageParams, DEFAULT_LIMIT};
use crate::db;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// 評価リクエスト
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    /// 1〜5
    pub rating: i64,
}

/// 自分の評価レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct MyRatingResponse {
    /// 未評価ならnull
    pub rating: Option<i64>,
}

fn validate_rating(rating: i64) -> Result<i64, HubError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(HubError::validation(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )))
    }
}

async fn invalidate_rating_caches(app_state: &AppState, tool_id: i64) {
    cache::invalidate_key(app_state.cache.as_ref(), &keys::rating_stats(tool_id)).await;
    cache::invalidate(
        app_state.cache.as_ref(),
        &[keys::TOOLS_PATTERN, keys::ADMIN_STATS_PATTERN],
    )
    .await;
}

/// POST /api/tools/{id}/rate - 評価の登録・上書き
///
/// # Returns
/// * `201 Created` - 登録後の評価
/// * `400 Bad Request` - 範囲外の評価、未承認のツール
/// * `404 Not Found` - ツールが存在しない
pub async fn rate_tool(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
    Json(request): Json<RateRequest>,
) -> Result<impl IntoResponse, Response> {
    let rating = validate_rating(request.rating).map_err(|e| into_response("Invalid rating", e))?;
    load_approved_tool(&app_state, tool_id).await?;

    let outcome = db::ratings::upsert(&app_state.db_pool, tool_id, user.id, rating)
        .await
        .map_err(|e| into_response("Failed to save rating", e))?;

    invalidate_rating_caches(&app_state, tool_id).await;

    let action = if outcome.created {
        actions::CREATE_RATING
    } else {
        actions::UPDATE_RATING
    };
    app_state
        .audit_log
        .log_action(
            &user,
            action,
            EntityType::Rating,
            Some(outcome.rating.id),
            Some(json!({ "tool_id": tool_id, "rating": rating })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(outcome.rating)))
}

/// GET /api/tools/{id}/my-rating - 自分の評価
pub async fn my_rating(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
) -> Result<impl IntoResponse, Response> {
    let rating = db::ratings::find(&app_state.db_pool, tool_id, user.id)
        .await
        .map_err(|e| into_response("Failed to load own rating", e))?;

    Ok(Json(MyRatingResponse {
        rating: rating.map(|r| r.rating),
    }))
}

/// GET /api/tools/{id}/ratings/stats - 評価統計（キャッシュ経由）
pub async fn rating_stats(
    State(app_state): State<AppState>,
    Path(tool_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Response> {
    // キャッシュより先に可視性を確認する
    load_visible_tool(&app_state, tool_id, &headers).await?;

    let key = keys::rating_stats(tool_id);
    if let Some(cached) = cache::get_json::<RatingStats>(app_state.cache.as_ref(), &key).await {
        return Ok(Json(cached));
    }

    let stats = db::ratings::stats(&app_state.db_pool, tool_id)
        .await
        .map_err(|e| into_response("Failed to compute rating stats", e))?;

    cache::set_json(
        app_state.cache.as_ref(),
        &key,
        &stats,
        app_state.config.cache_ttl,
    )
    .await;
    Ok(Json(stats))
}

/// GET /api/tools/{id}/ratings - 評価一覧（新しい順）
pub async fn list_ratings(
    State(app_state): State<AppState>,
    Path(tool_id): Path<i64>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Response> {
    load_visible_tool(&app_state, tool_id, &headers).await?;
    let ratings = db::ratings::list(&app_state.db_pool, tool_id, params.page(DEFAULT_LIMIT))
        .await
        .map_err(|e| into_response("Failed to list ratings", e))?;
    Ok(Json(ratings))
}

/// DELETE /api/tools/{id}/rate - 自分の評価を取り消す
pub async fn delete_rating(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
) -> Result<impl IntoResponse, Response> {
    let removed = db::ratings::delete(&app_state.db_pool, tool_id, user.id)
        .await
        .map_err(|e| into_response("Failed to delete rating", e))?
        .ok_or_else(|| {
            into_response(
                "Rating removal",
                HubError::NotFound("Rating not found".to_string()),
            )
        })?;

    invalidate_rating_caches(&app_state, tool_id).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::DELETE_RATING,
            EntityType::Rating,
            Some(removed.id),
            Some(json!({ "tool_id": tool_id })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
