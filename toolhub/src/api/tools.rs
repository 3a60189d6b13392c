//! ツールAPI
//!
//! 投稿、公開一覧（承認済みのみ）、検索、詳細、編集、削除

use super::error::into_response;
use crate::audit::{actions, EntityType};
use crate::auth::middleware::optional_user;
use crate::cache::{self, keys};
use crate::common::auth::{User, UserRole};
use crate::common::catalog::{Tool, ToolCategory, ToolStatus};
use crate::common::error::HubError;
use crate::common::pagination::{Page, DEFAULT_LIMIT};
use crate::db::{
    self,
    stats::ToolCounts,
    tools::{NewTool, ToolFilter, ToolUpdate},
};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// ツール名の最大文字数
pub const NAME_MAX_LENGTH: usize = 100;
/// 説明の最小文字数
pub const DESCRIPTION_MIN_LENGTH: usize = 10;
/// URLの最大文字数
pub const URL_MAX_LENGTH: usize = 500;

/// ツール投稿リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateToolRequest {
    /// 名前
    pub name: String,
    /// 説明
    pub description: String,
    /// カテゴリ
    pub category: String,
    /// URL
    #[serde(default)]
    pub url: Option<String>,
}

/// ツール編集リクエスト（未指定の項目は変更しない）
#[derive(Debug, Default, Deserialize)]
pub struct UpdateToolRequest {
    /// 名前
    #[serde(default)]
    pub name: Option<String>,
    /// 説明
    #[serde(default)]
    pub description: Option<String>,
    /// カテゴリ
    #[serde(default)]
    pub category: Option<String>,
    /// URL（空文字で削除）
    #[serde(default)]
    pub url: Option<String>,
}

/// 公開一覧のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ToolListQuery {
    /// カテゴリ
    pub category: Option<String>,
    /// 名前・説明の部分一致
    pub search: Option<String>,
    /// 読み飛ばす件数
    pub skip: Option<i64>,
    /// 取得件数
    pub limit: Option<i64>,
}

/// 検索のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ToolSearchQuery {
    /// 検索語
    pub q: Option<String>,
    /// カテゴリ
    pub category: Option<String>,
    /// 読み飛ばす件数
    pub skip: Option<i64>,
    /// 取得件数
    pub limit: Option<i64>,
}

/// 一覧レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    /// ツール
    pub tools: Vec<Tool>,
    /// 条件に合う総件数
    pub total: i64,
}

/// ツール詳細レスポンス
#[derive(Debug, Serialize)]
pub struct ToolDetailResponse {
    /// ツール本体（評価分布付き）
    #[serde(flatten)]
    pub tool: Tool,
    /// 閲覧者自身の評価
    pub user_rating: Option<i64>,
    /// コメント件数
    pub total_comments: i64,
}

/// カテゴリ文字列を解釈する（未指定はNone）
pub(crate) fn parse_category(value: Option<&str>) -> Result<Option<ToolCategory>, HubError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => ToolCategory::parse(raw)
            .map(Some)
            .ok_or_else(|| HubError::validation(format!("Invalid category '{}'", raw))),
    }
}

/// 状態文字列を解釈する（未指定はNone）
pub(crate) fn parse_status(value: Option<&str>) -> Result<Option<ToolStatus>, HubError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => ToolStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| HubError::validation(format!("Invalid status '{}'", raw))),
    }
}

fn validate_name(name: &str) -> Result<String, HubError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > NAME_MAX_LENGTH {
        return Err(HubError::validation(format!(
            "Name must be between 1 and {} characters",
            NAME_MAX_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String, HubError> {
    let description = description.trim();
    if description.chars().count() < DESCRIPTION_MIN_LENGTH {
        return Err(HubError::validation(format!(
            "Description must be at least {} characters",
            DESCRIPTION_MIN_LENGTH
        )));
    }
    Ok(description.to_string())
}

fn validate_url(url: Option<&str>) -> Result<Option<String>, HubError> {
    match url.map(str::trim).filter(|u| !u.is_empty()) {
        None => Ok(None),
        Some(u) if u.chars().count() > URL_MAX_LENGTH => Err(HubError::validation(format!(
            "URL must be at most {} characters",
            URL_MAX_LENGTH
        ))),
        Some(u) => Ok(Some(u.to_string())),
    }
}

/// ツールの変更を関連キャッシュへ反映する
pub(crate) async fn invalidate_tool_caches(app_state: &AppState) {
    cache::invalidate(
        app_state.cache.as_ref(),
        &[keys::TOOLS_PATTERN, keys::ADMIN_STATS_PATTERN],
    )
    .await;
}

/// ツールを取得する（存在しなければ404）
pub(crate) async fn load_tool(app_state: &AppState, tool_id: i64) -> Result<Tool, Response> {
    db::tools::find_by_id(&app_state.db_pool, tool_id)
        .await
        .map_err(|e| into_response("Failed to load tool", e))?
        .ok_or_else(|| {
            into_response(
                "Tool lookup",
                HubError::NotFound("Tool not found".to_string()),
            )
        })
}

/// 承認済みのツールを取得する（評価・コメントの対象）
pub(crate) async fn load_approved_tool(app_state: &AppState, tool_id: i64) -> Result<Tool, Response> {
    let tool = load_tool(app_state, tool_id).await?;
    if tool.status != ToolStatus::Approved {
        return Err(into_response(
            "Feedback on unapproved tool",
            HubError::validation("Tool is not approved"),
        ));
    }
    Ok(tool)
}

/// 閲覧者に見えるツールを取得する
///
/// 未承認・却下済みのツールは投稿者とモデレーター以上にだけ見え、
/// それ以外には存在しないものとして404を返す。
pub(crate) async fn load_visible_tool(
    app_state: &AppState,
    tool_id: i64,
    headers: &HeaderMap,
) -> Result<(Tool, Option<User>), Response> {
    let tool = load_tool(app_state, tool_id).await?;
    let viewer = optional_user(app_state, headers).await;

    if tool.status != ToolStatus::Approved {
        let visible = viewer.as_ref().is_some_and(|v| {
            tool.created_by == Some(v.id) || v.role.has_at_least(UserRole::Moderator)
        });
        if !visible {
            return Err(into_response(
                "Hidden tool requested",
                HubError::NotFound("Tool not found".to_string()),
            ));
        }
    }
    Ok((tool, viewer))
}

fn validate_submission(request: &CreateToolRequest, created_by: i64) -> Result<NewTool, HubError> {
    Ok(NewTool {
        name: validate_name(&request.name)?,
        description: validate_description(&request.description)?,
        category: parse_category(Some(&request.category))?
            .ok_or_else(|| HubError::validation("Category is required"))?,
        url: validate_url(request.url.as_deref())?,
        created_by,
    })
}

/// 投稿者本人または管理者であることを確認
fn ensure_owner_or_admin(tool: &Tool, user: &User, verb: &str) -> Result<(), HubError> {
    if tool.created_by == Some(user.id) || user.role == UserRole::Admin {
        Ok(())
    } else {
        Err(HubError::Authorization(format!(
            "Not authorized to {} this tool",
            verb
        )))
    }
}

/// POST /api/tools - ツール投稿（状態はpending）
pub async fn create_tool(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateToolRequest>,
) -> Result<impl IntoResponse, Response> {
    let new_tool = validate_submission(&request, user.id)
        .map_err(|e| into_response("Invalid tool submission", e))?;

    let tool = db::tools::create(&app_state.db_pool, &new_tool)
        .await
        .map_err(|e| into_response("Failed to create tool", e))?;

    invalidate_tool_caches(&app_state).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::CREATE,
            EntityType::Tool,
            Some(tool.id),
            Some(json!({ "name": tool.name, "category": tool.category })),
        )
        .await;

    tracing::info!(tool_id = tool.id, user_id = user.id, "Tool submitted");
    Ok((StatusCode::CREATED, Json(tool)))
}

/// GET /api/tools - 承認済みツールの一覧（キャッシュ経由）
pub async fn list_tools(
    State(app_state): State<AppState>,
    Query(query): Query<ToolListQuery>,
) -> Result<impl IntoResponse, Response> {
    let category =
        parse_category(query.category.as_deref()).map_err(|e| into_response("Invalid filter", e))?;
    let page = Page::new(query.skip, query.limit, DEFAULT_LIMIT);
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    // 検索語付きの一覧はキャッシュしない
    let cache_key = search
        .is_none()
        .then(|| keys::tools_list(category, Some(ToolStatus::Approved), page));
    if let Some(key) = &cache_key {
        if let Some(cached) = cache::get_json::<ToolListResponse>(app_state.cache.as_ref(), key).await
        {
            return Ok(Json(cached));
        }
    }

    let filter = ToolFilter {
        category,
        status: Some(ToolStatus::Approved),
        search,
        ..Default::default()
    };
    let response = fetch_page(&app_state, &filter, page).await?;

    if let Some(key) = &cache_key {
        cache::set_json(
            app_state.cache.as_ref(),
            key,
            &response,
            app_state.config.cache_ttl,
        )
        .await;
    }
    Ok(Json(response))
}

async fn fetch_page(
    app_state: &AppState,
    filter: &ToolFilter,
    page: Page,
) -> Result<ToolListResponse, Response> {
    let tools = db::tools::list(&app_state.db_pool, filter, page)
        .await
        .map_err(|e| into_response("Failed to list tools", e))?;
    let total = db::tools::count(&app_state.db_pool, filter)
        .await
        .map_err(|e| into_response("Failed to count tools", e))?;
    Ok(ToolListResponse { tools, total })
}

/// GET /api/tools/search?q= - 承認済みツールの検索
pub async fn search_tools(
    State(app_state): State<AppState>,
    Query(query): Query<ToolSearchQuery>,
) -> Result<impl IntoResponse, Response> {
    let term = query
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| {
            into_response(
                "Invalid search",
                HubError::validation("Search query is required"),
            )
        })?;
    let category =
        parse_category(query.category.as_deref()).map_err(|e| into_response("Invalid filter", e))?;

    let filter = ToolFilter {
        category,
        status: Some(ToolStatus::Approved),
        search: Some(term),
        ..Default::default()
    };
    let tools = db::tools::list(
        &app_state.db_pool,
        &filter,
        Page::new(query.skip, query.limit, DEFAULT_LIMIT),
    )
    .await
    .map_err(|e| into_response("Failed to search tools", e))?;

    Ok(Json(tools))
}

/// GET /api/tools/stats - 状態別・カテゴリ別のツール数（キャッシュ経由）
pub async fn tool_stats(State(app_state): State<AppState>) -> Result<impl IntoResponse, Response> {
    if let Some(cached) =
        cache::get_json::<ToolCounts>(app_state.cache.as_ref(), keys::TOOLS_STATS).await
    {
        return Ok(Json(cached));
    }

    let counts = db::stats::tool_counts(&app_state.db_pool)
        .await
        .map_err(|e| into_response("Failed to compute tool stats", e))?;

    cache::set_json(
        app_state.cache.as_ref(),
        keys::TOOLS_STATS,
        &counts,
        app_state.config.cache_ttl,
    )
    .await;
    Ok(Json(counts))
}

/// GET /api/tools/my - 自分が投稿したツール（全状態）
pub async fn my_tools(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, Response> {
    let filter = ToolFilter {
        created_by: Some(user.id),
        ..Default::default()
    };
    let tools = list_all(&app_state, &filter)
        .await
        .map_err(|e| into_response("Failed to list own tools", e))?;
    Ok(Json(tools))
}

/// 条件に合うツールをページを辿ってすべて取得する
pub(crate) async fn list_all(app_state: &AppState, filter: &ToolFilter) -> Result<Vec<Tool>, HubError> {
    let mut tools = Vec::new();
    let mut page = Page::new(None, None, DEFAULT_LIMIT);
    loop {
        let batch = db::tools::list(&app_state.db_pool, filter, page).await?;
        let done = (batch.len() as i64) < page.limit;
        tools.extend(batch);
        if done {
            return Ok(tools);
        }
        page.skip += page.limit;
    }
}

/// GET /api/tools/{id} - ツール詳細
///
/// 未承認のツールは投稿者とモデレーター以上にのみ見せ、それ以外は404。
pub async fn get_tool(
    State(app_state): State<AppState>,
    Path(tool_id): Path<i64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Response> {
    let (mut tool, viewer) = load_visible_tool(&app_state, tool_id, &headers).await?;

    let stats = db::ratings::stats(&app_state.db_pool, tool_id)
        .await
        .map_err(|e| into_response("Failed to load rating stats", e))?;
    tool.average_rating = stats.average_rating;
    tool.total_ratings = stats.total_ratings;
    tool.rating_distribution = Some(stats.rating_distribution);

    let user_rating = match &viewer {
        Some(v) => db::ratings::find(&app_state.db_pool, tool_id, v.id)
            .await
            .map_err(|e| into_response("Failed to load own rating", e))?
            .map(|r| r.rating),
        None => None,
    };
    let total_comments = db::comments::count_for_tool(&app_state.db_pool, tool_id)
        .await
        .map_err(|e| into_response("Failed to count comments", e))?;

    Ok(Json(ToolDetailResponse {
        tool,
        user_rating,
        total_comments,
    }))
}

/// PUT /api/tools/{id} - ツール編集（投稿者または管理者）
///
/// 投稿者による承認済み・却下済みツールの編集は再審査のためpendingに戻す。
pub async fn update_tool(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
    Json(request): Json<UpdateToolRequest>,
) -> Result<impl IntoResponse, Response> {
    let tool = load_tool(&app_state, tool_id).await?;
    ensure_owner_or_admin(&tool, &user, "update")
        .map_err(|e| into_response("Tool update rejected", e))?;

    let (mut changes, mut details) =
        build_update(&request).map_err(|e| into_response("Invalid tool update", e))?;

    if user.role != UserRole::Admin && tool.status != ToolStatus::Pending {
        changes.status = Some(ToolStatus::Pending);
        details.insert("status".to_string(), json!(ToolStatus::Pending));
    }

    let updated = db::tools::update(&app_state.db_pool, tool_id, changes)
        .await
        .map_err(|e| into_response("Failed to update tool", e))?;

    invalidate_tool_caches(&app_state).await;
    app_state
        .audit_log
        .log_action(
            &user,
            actions::UPDATE,
            EntityType::Tool,
            Some(tool_id),
            Some(Value::Object(details)),
        )
        .await;

    Ok(Json(updated))
}

/// 編集リクエストを検証し、DB更新内容と監査ログ用の変更項目を作る
fn build_update(request: &UpdateToolRequest) -> Result<(ToolUpdate, Map<String, Value>), HubError> {
    let mut changes = ToolUpdate::default();
    let mut details = Map::new();

    if let Some(name) = &request.name {
        let name = validate_name(name)?;
        details.insert("name".to_string(), json!(name));
        changes.name = Some(name);
    }
    if let Some(description) = &request.description {
        let description = validate_description(description)?;
        details.insert("description".to_string(), json!(description));
        changes.description = Some(description);
    }
    if let Some(category) = parse_category(request.category.as_deref())? {
        details.insert("category".to_string(), json!(category));
        changes.category = Some(category);
    }
    // 空文字はURLの削除
    if let Some(raw) = &request.url {
        let url = validate_url(Some(raw))?;
        details.insert("url".to_string(), json!(url));
        changes.url = Some(url);
    }

    Ok((changes, details))
}

/// DELETE /api/tools/{id} - ツール削除（投稿者または管理者）
pub async fn delete_tool(
    State(app_state): State<AppState>,
    Extension(user): Extension<User>,
    Path(tool_id): Path<i64>,
) -> Result<impl IntoResponse, Response> {
    let tool = load_tool(&app_state, tool_id).await?;
    ensure_owner_or_admin(&tool, &user, "delete")
        .map_err(|e| into_response("Tool deletion rejected", e))?;

    // 削除後は名前を引けないため先に記録する
    app_state
        .audit_log
        .log_action(
            &user,
            actions::DELETE,
            EntityType::Tool,
            Some(tool_id),
            Some(json!({ "name": tool.name })),
        )
        .await;

    db::tools::delete(&app_state.db_pool, tool_id)
        .await
        .map_err(|e| into_response("Failed to delete tool", e))?;

    invalidate_tool_caches(&app_state).await;
    cache::invalidate_key(app_state.cache.as_ref(), &keys::rating_stats(tool_id)).await;
    cache::invalidate(
        app_state.cache.as_ref(),
        &[keys::comments_pattern(tool_id).as_str()],
    )
    .await;

    tracing::info!(tool_id, user_id = user.id, "Tool deleted");
    Ok(StatusCode::NO_CONTENT)
}
