//! 監査ログの型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 監査ログの対象エンティティ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// ユーザー
    User,
    /// ツール
    Tool,
    /// 評価
    Rating,
    /// コメント
    Comment,
}

impl EntityType {
    /// DB格納用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Tool => "tool",
            Self::Rating => "rating",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 監査ログのアクション名
pub mod actions {
    /// ユーザー登録
    pub const REGISTER: &str = "register";
    /// ログイン（2FAなし）
    pub const LOGIN: &str = "login";
    /// 2FAコード検証によるログイン
    pub const TWO_FACTOR_VERIFIED: &str = "2fa_verified";
    /// 2FA有効化
    pub const SETUP_2FA: &str = "setup_2fa";
    /// 2FA無効化
    pub const DISABLE_2FA: &str = "disable_2fa";
    /// パスワード変更
    pub const CHANGE_PASSWORD: &str = "change_password";
    /// 作成
    pub const CREATE: &str = "create";
    /// 更新
    pub const UPDATE: &str = "update";
    /// 削除
    pub const DELETE: &str = "delete";
    /// 承認
    pub const APPROVE: &str = "approve";
    /// 却下
    pub const REJECT: &str = "reject";
    /// ロール変更
    pub const CHANGE_ROLE: &str = "change_role";
    /// 評価の新規登録
    pub const CREATE_RATING: &str = "create_rating";
    /// 評価の上書き
    pub const UPDATE_RATING: &str = "update_rating";
    /// 評価の削除
    pub const DELETE_RATING: &str = "delete_rating";
    /// コメント投稿
    pub const CREATE_COMMENT: &str = "create_comment";
    /// コメント編集
    pub const UPDATE_COMMENT: &str = "update_comment";
    /// コメント削除
    pub const DELETE_COMMENT: &str = "delete_comment";
    /// コメントへの投票
    pub const VOTE_COMMENT: &str = "vote_comment";
    /// 投票の取り消し
    pub const REMOVE_VOTE: &str = "remove_vote";
}

/// 監査ログエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// レコードID（DB挿入後に設定）
    pub id: Option<i64>,
    /// 操作したユーザーID
    pub user_id: Option<i64>,
    /// 操作したユーザー名（記録時点）
    pub username: Option<String>,
    /// アクション名
    pub action: String,
    /// 対象エンティティ種別
    pub entity_type: String,
    /// 対象エンティティID
    pub entity_id: Option<i64>,
    /// 追加情報（JSON）
    pub details: Option<serde_json::Value>,
    /// タイムスタンプ
    pub timestamp: DateTime<Utc>,
}

/// 監査ログの検索条件
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilter {
    /// 操作したユーザーID
    pub user_id: Option<i64>,
    /// アクション名
    pub action: Option<String>,
    /// 対象エンティティ種別
    pub entity_type: Option<String>,
}
