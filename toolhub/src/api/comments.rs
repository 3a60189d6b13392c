//! コメントAPI
//!
//! `/api/tools/{id}/comments` 配下のコメント投稿・編集・削除と投票

use super::error::into_response;
use super::tools::{load_approved_tool, load_visible_tool};
use crate::audit::{actions, EntityType};
use crate::cache::{self, keys};
use crate::common::auth::{User, UserRole};
use crate::common::catalog::{Comment, VoteType};
use crate::common::error::HubError;
use crate::common::pagination::{PageParams, DEFAULT_COMMENT_LIMIT};
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

/// 本文の最小文字数
pub const CONTENT_MIN_LENGTH: usize = 10;
/// 本文の最大文字数
pub const CONTENT_MAX_LENGTH: usize = 2000;

/// コメント投稿・編集リクエスト
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    /// 本文
    pub content: String,
}

/// 投票リクエスト
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// "up" または "down"
    pub vote: String,
}

/// 投票後のカウンタ
#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    /// コメントID
    pub comment_id: i64,
    /// 投票した種別
    pub vote: VoteType,
    /// 賛成票数
    pub upvotes: i64,
    /// 反対票数
    pub downvotes: i64,
}

fn validate_content(content: &str) -> Result<String, HubError> {
    let content = content.trim();
    let len = content.chars().count();
    if !(CONTENT_MIN_LENGTH..=CONTENT_MAX_LENGTH).contains(&len) {
        return Err(HubError::validation(format!(
            "Comment must be between {} and {} characters",
            CONTENT_MIN_LENGTH, CONTENT_MAX_LENGTH
        )));
    }
    Ok(content.to_string())
}

fn parse_vote(value: &str) -> Result<VoteType, HubError> {
    VoteType::parse(value.trim()).ok_or_else(|| HubError::validation("Vote must be 'up' or 'down'"))
}

async fn invalidate_comment_caches(app_state: &AppState, tool_id: i64) {
    cache::invalidate(
        app_state.cache.as_ref(),
        &[keys::comments_pattern(tool_id).as_str(), keys::ADMIN_STATS_PATTERN],
    )
    .await;
}

/// 指定ツールに属するコメントを取得する（別ツールのコメントは404）
async fn load_comment(app_state: &AppState, tool_id: i64, comment_id: i64) -> Result<Comment, Response> {
    db::comments::find_by_id(&app_state.db_pool, comment_id)
        .await
        .map_err(|e| into_response("Failed to load comment", e))?
        .filter(|c| c.tool_id == tool_id)
        .ok_or_else(|| {
            into_response(
                "Comment lookup",
                HubError::NotFound("Comment not found".to_string()),
            )
        })
}

/// POST /api/tools/{id}/comments - コメント投稿
pub async fn create_comment(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> Result<impl IntoResponse, Response> {
    let content =
        validate_content(&request.content).map_err(|e| into_response("Invalid comment", e))?;
    load_approved_tool(&app_state, tool_id).await?;

    let comment = db::comments::create(&app_state.db_pool, tool_id, user.id, &content)
        .await
        .map_err(|e| into_response("Failed to create comment", e))?;

    invalidate_comment_caches(&app_state, tool_id).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::CREATE_COMMENT,
            EntityType::Comment,
            Some(comment.id),
            Some(json!({ "tool_id": tool_id })),
        )
        .await;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/tools/{id}/comments - コメント一覧（新しい順、キャッシュ経由）
pub async fn list_comments(
    State(app_state): State<AppState>,
    Path(tool_id): Path<i64>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Response> {
    load_visible_tool(&app_state, tool_id, &headers).await?;

    let page = params.page(DEFAULT_COMMENT_LIMIT);
    let key = keys::comments(tool_id, page);
    if let Some(cached) = cache::get_json::<Vec<Comment>>(app_state.cache.as_ref(), &key).await {
        return Ok(Json(cached));
    }

    let comments = db::comments::list(&app_state.db_pool, tool_id, page)
        .await
        .map_err(|e| into_response("Failed to list comments", e))?;

    cache::set_json(
        app_state.cache.as_ref(),
        &key,
        &comments,
        app_state.config.cache_ttl,
    )
    .await;
    Ok(Json(comments))
}

/// PUT /api/tools/{id}/comments/{cid} - コメント編集（投稿者のみ）
pub async fn update_comment(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path((tool_id, comment_id)): Path<(i64, i64)>,
    Json(request): Json<CommentRequest>,
) -> Result<impl IntoResponse, Response> {
    let comment = load_comment(&app_state, tool_id, comment_id).await?;
    if comment.user_id != user.id {
        return Err(into_response(
            "Comment edit rejected",
            HubError::Authorization("Not authorized to edit this comment".to_string()),
        ));
    }
    let content =
        validate_content(&request.content).map_err(|e| into_response("Invalid comment", e))?;

    let updated = db::comments::update_content(&app_state.db_pool, comment_id, &content)
        .await
        .map_err(|e| into_response("Failed to update comment", e))?;

    invalidate_comment_caches(&app_state, tool_id).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::UPDATE_COMMENT,
            EntityType::Comment,
            Some(comment_id),
            Some(json!({ "tool_id": tool_id })),
        )
        .await;

    Ok(Json(updated))
}

/// DELETE /api/tools/{id}/comments/{cid} - コメント削除（投稿者またはモデレーター以上）
pub async fn delete_comment(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path((tool_id, comment_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, Response> {
    let comment = load_comment(&app_state, tool_id, comment_id).await?;
    let is_owner = comment.user_id == user.id;
    if !is_owner && !user.role.has_at_least(UserRole::Moderator) {
        return Err(into_response(
            "Comment deletion rejected",
            HubError::Authorization("Not authorized to delete this comment".to_string()),
        ));
    }

    db::comments::delete(&app_state.db_pool, comment_id)
        .await
        .map_err(|e| into_response("Failed to delete comment", e))?;

    invalidate_comment_caches(&app_state, tool_id).await;
    let reason = if is_owner {
        "deleted by owner"
    } else {
        "deleted by moderator"
    };
    app_state
        .audit_log
        .log_action(
            &user,
            actions::DELETE_COMMENT,
            EntityType::Comment,
            Some(comment_id),
            Some(json!({ "tool_id": tool_id, "reason": reason })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tools/{id}/comments/{cid}/vote - 投票（1ユーザー1票、切り替え可）
pub async fn vote_comment(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path((tool_id, comment_id)): Path<(i64, i64)>,
    Json(request): Json<VoteRequest>,
) -> Result<impl IntoResponse, Response> {
    let vote = parse_vote(&request.vote).map_err(|e| into_response("Invalid vote", e))?;
    load_comment(&app_state, tool_id, comment_id).await?;

    let (comment, previous) = db::comments::vote(&app_state.db_pool, comment_id, user.id, vote)
        .await
        .map_err(|e| into_response("Failed to record vote", e))?;

    invalidate_comment_caches(&app_state, tool_id).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::VOTE_COMMENT,
            EntityType::Comment,
            Some(comment_id),
            Some(json!({
                "tool_id": tool_id,
                "vote": vote,
                "previous": previous,
            })),
        )
        .await;

    Ok(Json(VoteResponse {
        comment_id,
        vote,
        upvotes: comment.upvotes,
        downvotes: comment.downvotes,
    }))
}

/// DELETE /api/tools/{id}/comments/{cid}/vote - 投票の取り消し
pub async fn remove_vote(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path((tool_id, comment_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, Response> {
    load_comment(&app_state, tool_id, comment_id).await?;

    let (_, removed) = db::comments::remove_vote(&app_state.db_pool, comment_id, user.id)
        .await
        .map_err(|e| into_response("Failed to remove vote", e))?
        .ok_or_else(|| {
            into_response(
                "Vote removal",
                HubError::NotFound("Vote not found".to_string()),
            )
        })?;

    invalidate_comment_caches(&app_state, tool_id).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::REMOVE_VOTE,
            EntityType::Comment,
            Some(comment_id),
            Some(json!({ "tool_id": tool_id, "vote": removed })),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}
