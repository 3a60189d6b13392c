//! 監査ログシステム
//!
//! 更新系操作を追記専用のaudit_logsテーブルに記録する。

/// 監査ログの型定義
pub mod types;

/// 監査ログライター
pub mod writer;

pub use types::{actions, AuditLogEntry, AuditLogFilter, EntityType};
pub use writer::AuditLogWriter;
