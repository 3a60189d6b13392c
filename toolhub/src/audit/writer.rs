//! 監査ログライター
//!
//! 更新系APIから呼ばれ、操作をaudit_logsへ追記する。
//! 追記に失敗してもリクエスト自体は失敗させない。

use super::types::{AuditLogEntry, EntityType};
use crate::common::auth::User;
use crate::db::audit_log::AuditLogStorage;
use chrono::Utc;
use std::sync::Arc;

/// 監査ログライター
#[derive(Debug, Clone)]
pub struct AuditLogWriter {
    storage: Arc<AuditLogStorage>,
}

impl AuditLogWriter {
    /// ストレージを指定して作成
    pub fn new(storage: Arc<AuditLogStorage>) -> Self {
        Self { storage }
    }

    /// 操作を記録する
    ///
    /// # Arguments
    /// * `actor` - 操作したユーザー
    /// * `action` - アクション名（`audit::types::actions`）
    /// * `entity_type` - 対象エンティティ種別
    /// * `entity_id` - 対象エンティティID
    /// * `details` - 追加情報
    pub async fn log_action(
        &self,
        actor: &User,
        action: &str,
        entity_type: EntityType,
        entity_id: Option<i64>,
        details: Option<serde_json::Value>,
    ) {
        let entry = AuditLogEntry {
            id: None,
            user_id: Some(actor.id),
            username: Some(actor.username.clone()),
            action: action.to_string(),
            entity_type: entity_type.as_str().to_string(),
            entity_id,
            details,
            timestamp: Utc::now(),
        };

        match self.storage.insert(&entry).await {
            Ok(id) => tracing::debug!(
                audit_id = id,
                user_id = actor.id,
                action,
                entity_type = %entity_type,
                "audit log recorded"
            ),
            Err(e) => tracing::warn!(
                user_id = actor.id,
                action,
                entity_type = %entity_type,
                "Failed to record audit log: {}",
                e
            ),
        }
    }

    /// 内部ストレージ（検索用）
    pub fn storage(&self) -> &AuditLogStorage {
        &self.storage
    }
}
