// 評価のCRUD操作と集計

use super::{parse_timestamp, to_db_timestamp, BEGIN_WRITE};
use crate::common::catalog::{Rating, RatingStats};
use crate::common::error::HubError;
use crate::common::pagination::Page;
use chrono::Utc;
use sqlx::SqlitePool;

const RATING_SELECT: &str = "SELECT r.id, r.tool_id, r.user_id, u.username, r.rating, \
     r.created_at, r.updated_at \
     FROM tool_ratings r LEFT JOIN users u ON u.id = r.user_id";

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: i64,
    tool_id: i64,
    user_id: i64,
    username: Option<String>,
    rating: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RatingRow> for Rating {
    type Error = HubError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        Ok(Rating {
            id: row.id,
            tool_id: row.tool_id,
            user_id: row.user_id,
            username: row.username,
            rating: row.rating,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// 評価の登録結果
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// 登録後の評価
    pub rating: Rating,
    /// 新規作成ならtrue、既存の上書きならfalse
    pub created: bool,
}

/// ユーザーの評価を登録または上書きする（1ユーザー1ツール1件）
pub async fn upsert(
    pool: &SqlitePool,
    tool_id: i64,
    user_id: i64,
    rating: i64,
) -> Result<UpsertOutcome, HubError> {
    let now = to_db_timestamp(Utc::now());
    let mut tx = pool
        .begin_with(BEGIN_WRITE)
        .await
        .map_err(|e| HubError::Database(format!("Failed to begin transaction: {}", e)))?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM tool_ratings WHERE tool_id = ? AND user_id = ?")
            .bind(tool_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| HubError::Database(format!("Failed to find rating: {}", e)))?;

    let (id, created) = match existing {
        Some(id) => {
            sqlx::query("UPDATE tool_ratings SET rating = ?, updated_at = ? WHERE id = ?")
                .bind(rating)
                .bind(&now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| HubError::Database(format!("Failed to update rating: {}", e)))?;
            (id, false)
        }
        None => {
            let id = sqlx::query(
                "INSERT INTO tool_ratings (tool_id, user_id, rating, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(tool_id)
            .bind(user_id)
            .bind(rating)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| HubError::Database(format!("Failed to create rating: {}", e)))?
            .last_insert_rowid();
            (id, true)
        }
    };

    let row = sqlx::query_as::<_, RatingRow>(&format!("{} WHERE r.id = ?", RATING_SELECT))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| HubError::Database(format!("Failed to load rating: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| HubError::Database(format!("Failed to commit rating: {}", e)))?;

    Ok(UpsertOutcome {
        rating: Rating::try_from(row)?,
        created,
    })
}

/// ユーザーがツールに付けた評価を取得
pub async fn find(pool: &SqlitePool, tool_id: i64, user_id: i64) -> Result<Option<Rating>, HubError> {
    let row = sqlx::query_as::<_, RatingRow>(&format!(
        "{} WHERE r.tool_id = ? AND r.user_id = ?",
        RATING_SELECT
    ))
    .bind(tool_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find rating: {}", e)))?;

    row.map(Rating::try_from).transpose()
}

/// ツールの評価を新しい順に取得
pub async fn list(pool: &SqlitePool, tool_id: i64, page: Page) -> Result<Vec<Rating>, HubError> {
    let rows = sqlx::query_as::<_, RatingRow>(&format!(
        "{} WHERE r.tool_id = ? ORDER BY r.created_at DESC, r.id DESC LIMIT ? OFFSET ?",
        RATING_SELECT
    ))
    .bind(tool_id)
    .bind(page.limit)
    .bind(page.skip)
    .fetch_all(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to list ratings: {}", e)))?;

    rows.into_iter().map(Rating::try_from).collect()
}

/// ユーザーの評価を削除
///
/// # Returns
/// * `Ok(Some(rating))` - 削除した評価
/// * `Ok(None)` - 評価が無かった
pub async fn delete(
    pool: &SqlitePool,
    tool_id: i64,
    user_id: i64,
) -> Result<Option<Rating>, HubError> {
    let Some(rating) = find(pool, tool_id, user_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM tool_ratings WHERE id = ?")
        .bind(rating.id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to delete rating: {}", e)))?;

    Ok(Some(rating))
}

/// ツールの評価統計を計算
pub async fn stats(pool: &SqlitePool, tool_id: i64) -> Result<RatingStats, HubError> {
    let counts: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT rating, COUNT(*) FROM tool_ratings WHERE tool_id = ? GROUP BY rating",
    )
    .bind(tool_id)
    .fetch_all(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to aggregate ratings: {}", e)))?;

    Ok(RatingStats::from_counts(counts))
}
