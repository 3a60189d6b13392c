//! 監査ログストレージ
//!
//! audit_logsテーブルへの追記と検索

use super::{parse_timestamp, to_db_timestamp};
use crate::audit::types::{AuditLogEntry, AuditLogFilter};
use crate::common::error::HubError;
use crate::common::pagination::Page;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

#[derive(sqlx::FromRow)]
struct AuditLogRow {
    id: i64,
    user_id: Option<i64>,
    username: Option<String>,
    action: String,
    entity_type: String,
    entity_id: Option<i64>,
    details: Option<String>,
    timestamp: String,
}

impl TryFrom<AuditLogRow> for AuditLogEntry {
    type Error = HubError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        let details = row
            .details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| HubError::Database(format!("Invalid audit details JSON: {}", e)))?;
        Ok(AuditLogEntry {
            id: Some(row.id),
            user_id: row.user_id,
            username: row.username,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details,
            timestamp: parse_timestamp(&row.timestamp)?,
        })
    }
}

/// 監査ログストレージ
#[derive(Debug, Clone)]
pub struct AuditLogStorage {
    pool: SqlitePool,
}

impl AuditLogStorage {
    /// 新しいAuditLogStorageを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// エントリを追記し、採番されたIDを返す
    pub async fn insert(&self, entry: &AuditLogEntry) -> Result<i64, HubError> {
        let details = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| HubError::Internal(format!("Failed to encode audit details: {}", e)))?;

        let result = sqlx::query(
            "INSERT INTO audit_logs (user_id, username, action, entity_type, entity_id, details, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.user_id)
        .bind(&entry.username)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(details)
        .bind(to_db_timestamp(entry.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to insert audit log: {}", e)))?;

        Ok(result.last_insert_rowid())
    }

    /// 条件に合うエントリを新しい順に取得
    pub async fn query(
        &self,
        filter: &AuditLogFilter,
        page: Page,
    ) -> Result<Vec<AuditLogEntry>, HubError> {
        let (where_clause, bind_values) = build_where_clause(filter);
        let sql = format!(
            "SELECT id, user_id, username, action, entity_type, entity_id, details, timestamp \
             FROM audit_logs {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut query = sqlx::query_as::<_, AuditLogRow>(&sql);
        for val in &bind_values {
            query = query.bind(val.as_str());
        }
        query = query.bind(page.limit).bind(page.skip);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HubError::Database(format!("Failed to query audit logs: {}", e)))?;

        rows.into_iter()
            .map(AuditLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()
    }

    /// 条件に合うエントリ数
    pub async fn count(&self, filter: &AuditLogFilter) -> Result<i64, HubError> {
        let (where_clause, bind_values) = build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_logs {}", where_clause);

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for val in &bind_values {
            query = query.bind(val.as_str());
        }

        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| HubError::Database(format!("Failed to count audit logs: {}", e)))
    }

    /// 指定日時以降のエントリ数
    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<i64, HubError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE timestamp >= ?")
            .bind(to_db_timestamp(since))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| HubError::Database(format!("Failed to count audit logs: {}", e)))
    }
}

/// フィルタからWHERE句とバインド値を構築
fn build_where_clause(filter: &AuditLogFilter) -> (String, Vec<String>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut bind_values: Vec<String> = Vec::new();

    if let Some(user_id) = filter.user_id {
        conditions.push("user_id = ?");
        bind_values.push(user_id.to_string());
    }

    if let Some(ref action) = filter.action {
        conditions.push("action = ?");
        bind_values.push(action.clone());
    }

    if let Some(ref entity_type) = filter.entity_type {
        conditions.push("entity_type = ?");
        bind_values.push(entity_type.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values)
}
