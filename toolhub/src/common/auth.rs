//! 認証関連のデータモデル

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ユーザーロール
///
/// 宣言順に権限が強くなる（`User` < `Moderator` < `Admin`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// 一般ユーザー（投稿・評価・コメント）
    User,
    /// モデレーター（ツールの承認・却下、コメント削除）
    Moderator,
    /// 管理者（ロール変更、監査ログ閲覧）
    Admin,
}

impl UserRole {
    /// すべてのロール
    pub const ALL: [UserRole; 3] = [UserRole::User, UserRole::Moderator, UserRole::Admin];

    /// DB格納用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    /// 文字列からロールに変換
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// 指定ロール以上の権限を持つか
    pub fn has_at_least(&self, required: UserRole) -> bool {
        *self >= required
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ユーザー
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// ユーザーID
    pub id: i64,
    /// ユーザー名
    pub username: String,
    /// メールアドレス
    pub email: String,
    /// パスワードハッシュ（bcrypt）
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// ユーザーロール
    pub role: UserRole,
    /// 二段階認証が有効か
    pub is_2fa_enabled: bool,
    /// 2FAコード送信先のTelegram chat ID
    pub telegram_id: Option<String>,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 更新日時
    pub updated_at: DateTime<Utc>,
    /// 最終ログイン日時
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// ログイン時に2FAコードの入力を求めるか
    pub fn requires_two_factor(&self) -> bool {
        self.is_2fa_enabled && self.telegram_id.is_some()
    }
}

/// JWTクレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// ユーザーID（JWT sub claim）
    pub sub: String,
    /// ユーザーロール（発行時点）
    pub role: UserRole,
    /// 有効期限（Unix timestamp）
    pub exp: usize,
    /// 2FAコード検証待ちの仮トークンか
    #[serde(default)]
    pub two_factor_pending: bool,
}

impl Claims {
    /// subをユーザーIDとして解釈
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}
