//! キャッシュキーの組み立て

use crate::common::catalog::{ToolCategory, ToolStatus};
use crate::common::pagination::Page;

/// ツール関連（一覧・統計）すべて
pub const TOOLS_PATTERN: &str = "tools:*";
/// ツール統計
pub const TOOLS_STATS: &str = "tools:stats";
/// 管理画面の概要統計
pub const ADMIN_STATS_OVERVIEW: &str = "admin:stats:overview";
/// 管理画面統計すべて
pub const ADMIN_STATS_PATTERN: &str = "admin:stats:*";

/// ツール一覧 `tools:list:{category}:{status}:{skip}:{limit}`
pub fn tools_list(category: Option<ToolCategory>, status: Option<ToolStatus>, page: Page) -> String {
    format!(
        "tools:list:{}:{}:{}:{}",
        category.map(|c| c.as_str()).unwrap_or("all"),
        status.map(|s| s.as_str()).unwrap_or("all"),
        page.skip,
        page.limit
    )
}

/// ツールの評価統計 `rating:stats:{tool_id}`
pub fn rating_stats(tool_id: i64) -> String {
    format!("rating:stats:{}", tool_id)
}

/// コメント一覧 `comments:{tool_id}:{skip}:{limit}`
pub fn comments(tool_id: i64, page: Page) -> String {
    format!("comments:{}:{}:{}", tool_id, page.skip, page.limit)
}

/// ツールのコメント一覧すべて `comments:{tool_id}:*`
pub fn comments_pattern(tool_id: i64) -> String {
    format!("comments:{}:*", tool_id)
}

/// 2FAコード `2fa:{user_id}`
pub fn two_factor(user_id: i64) -> String {
    format!("2fa:{}", user_id)
}
