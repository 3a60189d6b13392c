// ツールCRUD操作

use super::{parse_timestamp, to_db_timestamp};
use crate::common::catalog::{round2, Tool, ToolCategory, ToolStatus};
use crate::common::error::HubError;
use crate::common::pagination::Page;
use chrono::Utc;
use sqlx::SqlitePool;

/// 評価集計と投稿者名を付けたツールのSELECT
const TOOL_SELECT: &str = "SELECT t.id, t.name, t.description, t.category, t.status, t.url, \
     t.created_by, u.username AS created_by_username, t.approved_by, t.rejection_reason, \
     t.created_at, t.updated_at, \
     COALESCE(AVG(r.rating), 0.0) AS average_rating, COUNT(r.id) AS total_ratings \
     FROM tools t \
     LEFT JOIN users u ON u.id = t.created_by \
     LEFT JOIN tool_ratings r ON r.tool_id = t.id";

#[derive(sqlx::FromRow)]
struct ToolRow {
    id: i64,
    name: String,
    description: String,
    category: String,
    status: String,
    url: Option<String>,
    created_by: Option<i64>,
    created_by_username: Option<String>,
    approved_by: Option<i64>,
    rejection_reason: Option<String>,
    created_at: String,
    updated_at: String,
    average_rating: f64,
    total_ratings: i64,
}

impl TryFrom<ToolRow> for Tool {
    type Error = HubError;

    fn try_from(row: ToolRow) -> Result<Self, Self::Error> {
        let category = ToolCategory::parse(&row.category)
            .ok_or_else(|| HubError::Database(format!("Unknown category '{}'", row.category)))?;
        let status = ToolStatus::parse(&row.status)
            .ok_or_else(|| HubError::Database(format!("Unknown status '{}'", row.status)))?;
        Ok(Tool {
            id: row.id,
            name: row.name,
            description: row.description,
            category,
            status,
            url: row.url,
            created_by: row.created_by,
            created_by_username: row.created_by_username,
            approved_by: row.approved_by,
            rejection_reason: row.rejection_reason,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            average_rating: round2(row.average_rating),
            total_ratings: row.total_ratings,
            rating_distribution: None,
        })
    }
}

/// 新規ツール
#[derive(Debug, Clone)]
pub struct NewTool {
    /// 名前
    pub name: String,
    /// 説明
    pub description: String,
    /// カテゴリ
    pub category: ToolCategory,
    /// URL
    pub url: Option<String>,
    /// 投稿者ID
    pub created_by: i64,
}

/// ツールの部分更新（Noneは変更なし）
#[derive(Debug, Clone, Default)]
pub struct ToolUpdate {
    /// 名前
    pub name: Option<String>,
    /// 説明
    pub description: Option<String>,
    /// カテゴリ
    pub category: Option<ToolCategory>,
    /// URL（`Some(None)`で削除）
    pub url: Option<Option<String>>,
    /// 状態（投稿者による再申請時にPendingへ戻す）
    pub status: Option<ToolStatus>,
}

/// 一覧の絞り込み条件
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// カテゴリ
    pub category: Option<ToolCategory>,
    /// 状態
    pub status: Option<ToolStatus>,
    /// 投稿者ID
    pub created_by: Option<i64>,
    /// 名前・説明の部分一致検索
    pub search: Option<String>,
}

/// フィルタからWHERE句とバインド値を構築
fn build_where_clause(filter: &ToolFilter) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut bind_values: Vec<String> = Vec::new();

    if let Some(category) = filter.category {
        conditions.push("t.category = ?");
        bind_values.push(category.as_str().to_string());
    }

    if let Some(status) = filter.status {
        conditions.push("t.status = ?");
        bind_values.push(status.as_str().to_string());
    }

    if let Some(created_by) = filter.created_by {
        conditions.push("t.created_by = ?");
        bind_values.push(created_by.to_string());
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(t.name LIKE ? ESCAPE '\\' OR t.description LIKE ? ESCAPE '\\')");
        let pattern = format!("%{}%", escape_like(search));
        bind_values.push(pattern.clone());
        bind_values.push(pattern);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values)
}

/// LIKEのワイルドカードをエスケープ
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// ツールを作成（状態はPending）
pub async fn create(pool: &SqlitePool, new_tool: &NewTool) -> Result<Tool, HubError> {
    let now = to_db_timestamp(Utc::now());

    let id = sqlx::query(
        "INSERT INTO tools (name, description, category, status, url, created_by, approved_by, rejection_reason, created_at, updated_at)
         VALUES (?, ?, ?, 'pending', ?, ?, NULL, NULL, ?, ?)",
    )
    .bind(&new_tool.name)
    .bind(&new_tool.description)
    .bind(new_tool.category.as_str())
    .bind(&new_tool.url)
    .bind(new_tool.created_by)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to create tool: {}", e)))?
    .last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::Database(format!("Tool {} vanished after insert", id)))
}

/// IDでツールを取得
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Tool>, HubError> {
    let row = sqlx::query_as::<_, ToolRow>(&format!(
        "{} WHERE t.id = ? GROUP BY t.id",
        TOOL_SELECT
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find tool: {}", e)))?;

    row.map(Tool::try_from).transpose()
}

/// 条件に合うツールを新しい順に取得
pub async fn list(pool: &SqlitePool, filter: &ToolFilter, page: Page) -> Result<Vec<Tool>, HubError> {
    let (where_clause, bind_values) = build_where_clause(filter);
    let sql = format!(
        "{} {} GROUP BY t.id ORDER BY t.created_at DESC, t.id DESC LIMIT ? OFFSET ?",
        TOOL_SELECT, where_clause
    );

    let mut query = sqlx::query_as::<_, ToolRow>(&sql);
    for val in &bind_values {
        query = query.bind(val.as_str());
    }
    query = query.bind(page.limit).bind(page.skip);

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to list tools: {}", e)))?;

    rows.into_iter().map(Tool::try_from).collect()
}

/// 条件に合うツールの件数
pub async fn count(pool: &SqlitePool, filter: &ToolFilter) -> Result<i64, HubError> {
    let (where_clause, bind_values) = build_where_clause(filter);
    let sql = format!("SELECT COUNT(*) FROM tools t {}", where_clause);

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for val in &bind_values {
        query = query.bind(val.as_str());
    }

    query
        .fetch_one(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to count tools: {}", e)))
}

/// ツールを部分更新
pub async fn update(pool: &SqlitePool, id: i64, changes: ToolUpdate) -> Result<Tool, HubError> {
    let current = find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::NotFound("Tool not found".to_string()))?;

    let name = changes.name.unwrap_or(current.name);
    let description = changes.description.unwrap_or(current.description);
    let category = changes.category.unwrap_or(current.category);
    let url = changes.url.unwrap_or(current.url);
    let status = changes.status.unwrap_or(current.status);

    sqlx::query(
        "UPDATE tools SET name = ?, description = ?, category = ?, url = ?, status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&name)
    .bind(&description)
    .bind(category.as_str())
    .bind(&url)
    .bind(status.as_str())
    .bind(to_db_timestamp(Utc::now()))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to update tool: {}", e)))?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::NotFound("Tool not found".to_string()))
}

/// 承認・却下の結果を記録
///
/// 承認時は却下理由を消し、却下時は理由を保存する。
pub async fn set_moderation(
    pool: &SqlitePool,
    id: i64,
    approved: bool,
    moderator_id: i64,
    reason: Option<&str>,
) -> Result<Tool, HubError> {
    let (status, rejection_reason) = if approved {
        (ToolStatus::Approved, None)
    } else {
        (ToolStatus::Rejected, reason)
    };

    let result = sqlx::query(
        "UPDATE tools SET status = ?, approved_by = ?, rejection_reason = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(moderator_id)
    .bind(rejection_reason)
    .bind(to_db_timestamp(Utc::now()))
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to moderate tool: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(HubError::NotFound("Tool not found".to_string()));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::NotFound("Tool not found".to_string()))
}

/// ツールを削除（評価・コメントは外部キーで連鎖削除）
///
/// # Returns
/// * `Ok(true)` - 削除した
/// * `Ok(false)` - 存在しなかった
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, HubError> {
    let result = sqlx::query("DELETE FROM tools WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to delete tool: {}", e)))?;
    Ok(result.rows_affected() > 0)
}
