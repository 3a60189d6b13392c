//! 管理API
//!
//! モデレーション、ユーザーロール管理、監査ログ閲覧、集計。
//! ロールの確認はルーター側のミドルウェアで行う。

use super::error::into_response;
use super::tools::{invalidate_tool_caches, list_all, load_tool, parse_category, parse_status};
use crate::audit::{actions, AuditLogEntry, AuditLogFilter, EntityType};
use crate::cache::{self, keys};
use crate::common::auth::{User, UserRole};
use crate::common::catalog::{ToolCategory, ToolStatus};
use crate::common::error::HubError;
use crate::common::pagination::{Page, DEFAULT_LIMIT};
use crate::db::{
    self,
    stats::{ToolCounts, UserCounts},
    tools::ToolFilter,
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// 直近の操作として数える期間（時間）
const RECENT_ACTIVITY_HOURS: i64 = 24;
/// `/statistics`に載せる直近の監査ログ件数
const RECENT_ACTIVITY_ENTRIES: i64 = 10;

/// 管理用ツール一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct AdminToolQuery {
    /// カテゴリ
    pub category: Option<String>,
    /// 状態
    pub status: Option<String>,
    /// 投稿者ID
    pub created_by: Option<i64>,
    /// 読み飛ばす件数
    pub skip: Option<i64>,
    /// 取得件数
    pub limit: Option<i64>,
}

/// 承認・却下リクエスト
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    /// trueで承認、falseで却下
    pub approved: bool,
    /// 却下理由
    #[serde(default)]
    pub reason: Option<String>,
}

/// ユーザー一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    /// ロール
    pub role: Option<String>,
    /// 読み飛ばす件数
    pub skip: Option<i64>,
    /// 取得件数
    pub limit: Option<i64>,
}

/// ロール変更リクエスト
#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    /// 新しいロール
    pub role: String,
}

/// 監査ログ検索のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    /// 操作したユーザーID
    pub user_id: Option<i64>,
    /// アクション名
    pub action: Option<String>,
    /// 対象エンティティ種別
    pub entity_type: Option<String>,
    /// 読み飛ばす件数
    pub skip: Option<i64>,
    /// 取得件数
    pub limit: Option<i64>,
}

/// 評価・コメントの総数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackCounts {
    /// 評価数
    pub ratings: i64,
    /// コメント数
    pub comments: i64,
}

/// 監査ログの件数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCounts {
    /// 総数
    pub total_actions: i64,
    /// 直近24時間
    pub recent_actions: i64,
}

/// 管理画面の概要統計
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsOverview {
    /// ユーザー
    pub users: UserCounts,
    /// ツール
    pub tools: ToolCounts,
    /// 評価・コメント
    pub feedback: FeedbackCounts,
    /// 監査ログ
    pub activity: ActivityCounts,
}

/// 一覧形式の集計の1行
#[derive(Debug, Clone, Serialize)]
pub struct CountRow {
    /// 集計キー（role/status/category）
    #[serde(flatten)]
    pub key: serde_json::Map<String, serde_json::Value>,
    /// 件数
    pub count: i64,
}

/// 一覧形式の集計
#[derive(Debug, Serialize)]
pub struct Statistics {
    /// ロール別ユーザー数
    pub users_by_role: Vec<CountRow>,
    /// 状態別ツール数
    pub tools_by_status: Vec<CountRow>,
    /// カテゴリ別ツール数
    pub tools_by_category: Vec<CountRow>,
    /// 直近の監査ログ
    pub recent_activity: Vec<AuditLogEntry>,
}

fn count_row(field: &str, value: &str, count: i64) -> CountRow {
    let mut key = serde_json::Map::new();
    key.insert(field.to_string(), json!(value));
    CountRow { key, count }
}

/// 集計マップを既定の順序で一覧化する（未出現のキーは0件）
fn to_rows<'a>(
    field: &str,
    order: impl IntoIterator<Item = &'a str>,
    counts: &std::collections::BTreeMap<String, i64>,
) -> Vec<CountRow> {
    order
        .into_iter()
        .map(|k| count_row(field, k, counts.get(k).copied().unwrap_or(0)))
        .collect()
}

fn tool_filter(query: &AdminToolQuery) -> Result<ToolFilter, HubError> {
    Ok(ToolFilter {
        category: parse_category(query.category.as_deref())?,
        status: parse_status(query.status.as_deref())?,
        created_by: query.created_by,
        search: None,
    })
}

/// GET /api/admin/tools - 全ツール一覧（モデレーター以上）
pub async fn list_tools(
    State(app_state): State<AppState>,
    Query(query): Query<AdminToolQuery>,
) -> Result<impl IntoResponse, Response> {
    let filter = tool_filter(&query).map_err(|e| into_response("Invalid filter", e))?;

    let tools = db::tools::list(
        &app_state.db_pool,
        &filter,
        Page::new(query.skip, query.limit, DEFAULT_LIMIT),
    )
    .await
    .map_err(|e| into_response("Failed to list tools", e))?;
    Ok(Json(tools))
}

/// GET /api/admin/tools/pending - 承認待ちツール（新しい順）
pub async fn pending_tools(State(app_state): State<AppState>) -> Result<impl IntoResponse, Response> {
    let filter = ToolFilter {
        status: Some(ToolStatus::Pending),
        ..Default::default()
    };
    let tools = list_all(&app_state, &filter)
        .await
        .map_err(|e| into_response("Failed to list pending tools", e))?;
    Ok(Json(tools))
}

/// POST /api/admin/tools/{id}/approve - 承認・却下
///
/// 承認時は却下理由を消し、却下時は理由を保存する。どちらも`approved_by`を記録する。
pub async fn approve_tool(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
    Json(request): Json<ApprovalRequest>,
) -> Result<impl IntoResponse, Response> {
    load_tool(&app_state, tool_id).await?;

    let reason = request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let tool = db::tools::set_moderation(&app_state.db_pool, tool_id, request.approved, user.id, reason)
        .await
        .map_err(|e| into_response("Failed to moderate tool", e))?;

    invalidate_tool_caches(&app_state).await;

    let action = if request.approved {
        actions::APPROVE
    } else {
        actions::REJECT
    };
    app_state
        .audit_log
        .log_action(
            &user,
            action,
            EntityType::Tool,
            Some(tool_id),
            Some(json!({ "status": tool.status, "reason": reason })),
        )
        .await;

    tracing::info!(tool_id, moderator_id = user.id, status = tool.status.as_str(), "Tool moderated");
    Ok(Json(tool))
}

/// GET /api/admin/users - ユーザー一覧（管理者）
pub async fn list_users(
    State(app_state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, Response> {
    let role = match query.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => None,
        Some(raw) => Some(UserRole::parse(raw).ok_or_else(|| {
            into_response(
                "Invalid filter",
                HubError::validation(format!("Invalid role '{}'", raw)),
            )
        })?),
    };

    let users = db::users::list(
        &app_state.db_pool,
        role,
        Page::new(query.skip, query.limit, DEFAULT_LIMIT),
    )
    .await
    .map_err(|e| into_response("Failed to list users", e))?;
    Ok(Json(users))
}

/// PUT /api/admin/users/{id}/role - ロール変更（管理者）
///
/// # Returns
/// * `200 OK` - 変更後のユーザー
/// * `400 Bad Request` - 不明なロール、自分自身のロール変更
/// * `404 Not Found` - ユーザーが存在しない
pub async fn change_role(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(target_id): Path<i64>,
    Json(request): Json<RoleChangeRequest>,
) -> Result<impl IntoResponse, Response> {
    let new_role = UserRole::parse(request.role.trim()).ok_or_else(|| {
        into_response(
            "Invalid role change",
            HubError::validation(format!("Invalid role '{}'", request.role)),
        )
    })?;

    let target = db::users::find_by_id(&app_state.db_pool, target_id)
        .await
        .map_err(|e| into_response("Failed to load user", e))?
        .ok_or_else(|| {
            into_response(
                "Role change",
                HubError::NotFound("User not found".to_string()),
            )
        })?;

    if target.id == user.id {
        return Err(into_response(
            "Role change rejected",
            HubError::validation("Cannot change your own role"),
        ));
    }

    let updated = db::users::update_role(&app_state.db_pool, target_id, new_role)
        .await
        .map_err(|e| into_response("Failed to update role", e))?;

    invalidate_admin_stats(&app_state).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::CHANGE_ROLE,
            EntityType::User,
            Some(target_id),
            Some(json!({ "old_role": target.role, "new_role": new_role })),
        )
        .await;

    tracing::info!(
        target_id,
        admin_id = user.id,
        old_role = %target.role,
        new_role = %new_role,
        "User role changed"
    );
    Ok(Json(updated))
}

/// GET /api/admin/audit-logs - 監査ログ（管理者、新しい順）
pub async fn audit_logs(
    State(app_state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, Response> {
    let filter = AuditLogFilter {
        user_id: query.user_id,
        action: query.action.filter(|a| !a.is_empty()),
        entity_type: query.entity_type.filter(|t| !t.is_empty()),
    };
    let entries = app_state
        .audit_log
        .storage()
        .query(&filter, Page::new(query.skip, query.limit, DEFAULT_LIMIT))
        .await
        .map_err(|e| into_response("Failed to query audit logs", e))?;
    Ok(Json(entries))
}

/// 管理画面の集計キャッシュを無効化する
///
/// ユーザー・評価・コメントの件数が変わる操作から呼ぶ。
pub(crate) async fn invalidate_admin_stats(app_state: &AppState) {
    cache::invalidate(app_state.cache.as_ref(), &[keys::ADMIN_STATS_PATTERN]).await;
}

async fn compute_overview(app_state: &AppState) -> Result<StatsOverview, HubError> {
    let pool = &app_state.db_pool;
    let users = db::stats::user_counts(pool).await?;
    let tools = db::stats::tool_counts(pool).await?;
    let (ratings, comments) = db::stats::feedback_totals(pool).await?;

    let storage = app_state.audit_log.storage();
    let total_actions = storage.count(&AuditLogFilter::default()).await?;
    let recent_actions = storage
        .count_since(Utc::now() - Duration::hours(RECENT_ACTIVITY_HOURS))
        .await?;

    Ok(StatsOverview {
        users,
        tools,
        feedback: FeedbackCounts { ratings, comments },
        activity: ActivityCounts {
            total_actions,
            recent_actions,
        },
    })
}

/// GET /api/admin/stats/overview - 概要統計（モデレーター以上、キャッシュ経由）
pub async fn stats_overview(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Response> {
    if let Some(cached) =
        cache::get_json::<StatsOverview>(app_state.cache.as_ref(), keys::ADMIN_STATS_OVERVIEW).await
    {
        return Ok(Json(cached));
    }

    let overview = compute_overview(&app_state)
        .await
        .map_err(|e| into_response("Failed to compute overview", e))?;

    cache::set_json(
        app_state.cache.as_ref(),
        keys::ADMIN_STATS_OVERVIEW,
        &overview,
        app_state.config.cache_ttl,
    )
    .await;
    Ok(Json(overview))
}

/// GET /api/admin/statistics - 一覧形式の集計（モデレーター以上）
pub async fn statistics(State(app_state): State<AppState>) -> Result<impl IntoResponse, Response> {
    let result = async {
        let users = db::stats::user_counts(&app_state.db_pool).await?;
        let tools = db::stats::tool_counts(&app_state.db_pool).await?;
        let recent_activity = app_state
            .audit_log
            .storage()
            .query(
                &AuditLogFilter::default(),
                Page::new(None, Some(RECENT_ACTIVITY_ENTRIES), DEFAULT_LIMIT),
            )
            .await?;

        Ok::<_, HubError>(Statistics {
            users_by_role: to_rows("role", UserRole::ALL.iter().map(|r| r.as_str()), &users.by_role),
            tools_by_status: to_rows(
                "status",
                ToolStatus::ALL.iter().map(|s| s.as_str()),
                &tools.by_status,
            ),
            tools_by_category: to_rows(
                "category",
                ToolCategory::ALL.iter().map(|c| c.as_str()),
                &tools.by_category,
            ),
            recent_activity,
        })
    }
    .await
    .map_err(|e| into_response("Failed to compute statistics", e))?;

    Ok(Json(result))
}
