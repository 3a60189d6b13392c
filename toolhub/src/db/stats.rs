// 統計用の集計クエリ

use crate::common::auth::UserRole;
use crate::common::catalog::{ToolCategory, ToolStatus};
use crate::common::error::HubError;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// ユーザー数の集計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCounts {
    /// 総数
    pub total: i64,
    /// ロール別
    pub by_role: BTreeMap<String, i64>,
    /// 2FA有効ユーザー数
    pub with_2fa: i64,
}

/// ツール数の集計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCounts {
    /// 総数
    pub total: i64,
    /// 状態別
    pub by_status: BTreeMap<String, i64>,
    /// カテゴリ別
    pub by_category: BTreeMap<String, i64>,
}

async fn grouped(pool: &SqlitePool, sql: &str) -> Result<Vec<(String, i64)>, HubError> {
    sqlx::query_as(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to aggregate: {}", e)))
}

/// 既知のキーを0で初期化してから集計結果を埋める
fn fill<'a>(keys: impl IntoIterator<Item = &'a str>, rows: Vec<(String, i64)>) -> BTreeMap<String, i64> {
    let mut map: BTreeMap<String, i64> = keys.into_iter().map(|k| (k.to_string(), 0)).collect();
    for (key, count) in rows {
        map.insert(key, count);
    }
    map
}

/// ユーザー数を集計
pub async fn user_counts(pool: &SqlitePool) -> Result<UserCounts, HubError> {
    let by_role = fill(
        UserRole::ALL.iter().map(|r| r.as_str()),
        grouped(pool, "SELECT role, COUNT(*) FROM users GROUP BY role").await?,
    );
    let with_2fa: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_2fa_enabled = 1")
        .fetch_one(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to count 2FA users: {}", e)))?;

    Ok(UserCounts {
        total: by_role.values().sum(),
        by_role,
        with_2fa,
    })
}

/// ツール数を集計
pub async fn tool_counts(pool: &SqlitePool) -> Result<ToolCounts, HubError> {
    let by_status = fill(
        ToolStatus::ALL.iter().map(|s| s.as_str()),
        grouped(pool, "SELECT status, COUNT(*) FROM tools GROUP BY status").await?,
    );
    let by_category = fill(
        ToolCategory::ALL.iter().map(|c| c.as_str()),
        grouped(pool, "SELECT category, COUNT(*) FROM tools GROUP BY category").await?,
    );

    Ok(ToolCounts {
        total: by_status.values().sum(),
        by_status,
        by_category,
    })
}

/// 評価とコメントの総数 `(ratings, comments)`
pub async fn feedback_totals(pool: &SqlitePool) -> Result<(i64, i64), HubError> {
    sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM tool_ratings), (SELECT COUNT(*) FROM tool_comments)",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to count feedback: {}", e)))
}
