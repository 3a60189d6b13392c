// コメントと投票のCRUD操作

use super::{parse_timestamp, to_db_timestamp, BEGIN_WRITE};
use crate::common::catalog::{vote_delta, Comment, VoteType};
use crate::common::error::HubError;
use crate::common::pagination::Page;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

const COMMENT_SELECT: &str = "SELECT c.id, c.tool_id, c.user_id, u.username, c.content, \
     c.upvotes, c.downvotes, c.created_at, c.updated_at \
     FROM tool_comments c LEFT JOIN users u ON u.id = c.user_id";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    tool_id: i64,
    user_id: i64,
    username: Option<String>,
    content: String,
    upvotes: i64,
    downvotes: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CommentRow> for Comment {
    type Error = HubError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: row.id,
            tool_id: row.tool_id,
            user_id: row.user_id,
            username: row.username,
            content: row.content,
            upvotes: row.upvotes,
            downvotes: row.downvotes,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// コメントを作成
pub async fn create(
    pool: &SqlitePool,
    tool_id: i64,
    user_id: i64,
    content: &str,
) -> Result<Comment, HubError> {
    let now = to_db_timestamp(Utc::now());
    let id = sqlx::query(
        "INSERT INTO tool_comments (tool_id, user_id, content, upvotes, downvotes, created_at, updated_at)
         VALUES (?, ?, ?, 0, 0, ?, ?)",
    )
    .bind(tool_id)
    .bind(user_id)
    .bind(content)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to create comment: {}", e)))?
    .last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::Database(format!("Comment {} vanished after insert", id)))
}

/// IDでコメントを取得
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Comment>, HubError> {
    let row = sqlx::query_as::<_, CommentRow>(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to find comment: {}", e)))?;

    row.map(Comment::try_from).transpose()
}

/// ツールのコメントを新しい順に取得
pub async fn list(pool: &SqlitePool, tool_id: i64, page: Page) -> Result<Vec<Comment>, HubError> {
    let rows = sqlx::query_as::<_, CommentRow>(&format!(
        "{} WHERE c.tool_id = ? ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
        COMMENT_SELECT
    ))
    .bind(tool_id)
    .bind(page.limit)
    .bind(page.skip)
    .fetch_all(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to list comments: {}", e)))?;

    rows.into_iter().map(Comment::try_from).collect()
}

/// ツールのコメント件数
pub async fn count_for_tool(pool: &SqlitePool, tool_id: i64) -> Result<i64, HubError> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tool_comments WHERE tool_id = ?")
        .bind(tool_id)
        .fetch_one(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to count comments: {}", e)))
}

/// コメント本文を更新
pub async fn update_content(pool: &SqlitePool, id: i64, content: &str) -> Result<Comment, HubError> {
    sqlx::query("UPDATE tool_comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(to_db_timestamp(Utc::now()))
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to update comment: {}", e)))?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| HubError::NotFound("Comment not found".to_string()))
}

/// コメントを削除（投票は外部キーで連鎖削除）
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, HubError> {
    let result = sqlx::query("DELETE FROM tool_comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| HubError::Database(format!("Failed to delete comment: {}", e)))?;
    Ok(result.rows_affected() > 0)
}

/// ユーザーの投票を取得
#[cfg(test)]
pub async fn find_vote(
    pool: &SqlitePool,
    comment_id: i64,
    user_id: i64,
) -> Result<Option<VoteType>, HubError> {
    let vote: Option<String> = sqlx::query_scalar(
        "SELECT vote_type FROM comment_votes WHERE comment_id = ? AND user_id = ?",
    )
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find vote: {}", e)))?;

    vote.map(|v| parse_vote(&v)).transpose()
}

fn parse_vote(value: &str) -> Result<VoteType, HubError> {
    VoteType::parse(value)
        .ok_or_else(|| HubError::Database(format!("Unknown vote type '{}'", value)))
}

async fn current_vote(
    tx: &mut Transaction<'_, Sqlite>,
    comment_id: i64,
    user_id: i64,
) -> Result<Option<VoteType>, HubError> {
    let vote: Option<String> = sqlx::query_scalar(
        "SELECT vote_type FROM comment_votes WHERE comment_id = ? AND user_id = ?",
    )
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| HubError::Database(format!("Failed to find vote: {}", e)))?;

    vote.map(|v| parse_vote(&v)).transpose()
}

async fn apply_counters(
    tx: &mut Transaction<'_, Sqlite>,
    comment_id: i64,
    previous: Option<VoteType>,
    next: Option<VoteType>,
) -> Result<(), HubError> {
    let (up, down) = vote_delta(previous, next);
    if up == 0 && down == 0 {
        return Ok(());
    }
    sqlx::query(
        "UPDATE tool_comments SET upvotes = MAX(upvotes + ?, 0), downvotes = MAX(downvotes + ?, 0) WHERE id = ?",
    )
    .bind(up)
    .bind(down)
    .bind(comment_id)
    .execute(&mut **tx)
    .await
    .map_err(|e| HubError::Database(format!("Failed to update vote counters: {}", e)))?;
    Ok(())
}

async fn load_in_tx(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<Comment, HubError> {
    let row = sqlx::query_as::<_, CommentRow>(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| HubError::Database(format!("Failed to load comment: {}", e)))?;
    Comment::try_from(row)
}

/// 投票を登録・変更する
///
/// 1ユーザー1コメント1票。別の種別に切り替えた場合は旧票のカウンタを戻す。
/// 同じ種別の再投票はカウンタを変えない。
///
/// # Returns
/// * `Ok((comment, previous))` - 更新後のコメントと変更前の票
pub async fn vote(
    pool: &SqlitePool,
    comment_id: i64,
    user_id: i64,
    vote: VoteType,
) -> Result<(Comment, Option<VoteType>), HubError> {
    let mut tx = pool
        .begin_with(BEGIN_WRITE)
        .await
        .map_err(|e| HubError::Database(format!("Failed to begin transaction: {}", e)))?;

    let previous = current_vote(&mut tx, comment_id, user_id).await?;

    match previous {
        Some(prev) if prev == vote => {}
        Some(_) => {
            sqlx::query(
                "UPDATE comment_votes SET vote_type = ? WHERE comment_id = ? AND user_id = ?",
            )
            .bind(vote.as_str())
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| HubError::Database(format!("Failed to change vote: {}", e)))?;
        }
        None => {
            sqlx::query(
                "INSERT INTO comment_votes (comment_id, user_id, vote_type, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(comment_id)
            .bind(user_id)
            .bind(vote.as_str())
            .bind(to_db_timestamp(Utc::now()))
            .execute(&mut *tx)
            .await
            .map_err(|e| HubError::Database(format!("Failed to record vote: {}", e)))?;
        }
    }

    apply_counters(&mut tx, comment_id, previous, Some(vote)).await?;
    let comment = load_in_tx(&mut tx, comment_id).await?;

    tx.commit()
        .await
        .map_err(|e| HubError::Database(format!("Failed to commit vote: {}", e)))?;

    Ok((comment, previous))
}

/// 投票を取り消す
///
/// # Returns
/// * `Ok(Some((comment, removed)))` - 更新後のコメントと取り消した票
/// * `Ok(None)` - 投票していなかった
pub async fn remove_vote(
    pool: &SqlitePool,
    comment_id: i64,
    user_id: i64,
) -> Result<Option<(Comment, VoteType)>, HubError> {
    let mut tx = pool
        .begin_with(BEGIN_WRITE)
        .await
        .map_err(|e| HubError::Database(format!("Failed to begin transaction: {}", e)))?;

    let Some(previous) = current_vote(&mut tx, comment_id, user_id).await? else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM comment_votes WHERE comment_id = ? AND user_id = ?")
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| HubError::Database(format!("Failed to remove vote: {}", e)))?;

    apply_counters(&mut tx, comment_id, Some(previous), None).await?;
    let comment = load_in_tx(&mut tx, comment_id).await?;

    tx.commit()
        .await
        .map_err(|e| HubError::Database(format!("Failed to commit vote removal: {}", e)))?;

    Ok(Some((comment, previous)))
}
