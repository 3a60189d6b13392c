//! データベースアクセス層
//!
//! SQLiteベースのデータ永続化

/// ユーザー管理
pub mod users;

/// ツール管理
pub mod tools;

/// 評価管理
pub mod ratings;

/// コメント・投票管理
pub mod comments;

/// 監査ログストレージ
pub mod audit_log;

/// 集計クエリ
pub mod stats;

/// データベースマイグレーション
pub mod migrations;

use crate::common::error::HubError;
use chrono::{DateTime, SecondsFormat, Utc};

/// 日時をDB格納用の文字列に変換する（UTC、マイクロ秒精度で固定長）
pub(crate) fn to_db_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// DBの日時文字列を解釈する
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, HubError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HubError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

/// NULL許容の日時文字列を解釈する
pub(crate) fn parse_optional_timestamp(
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, HubError> {
    value.map(parse_timestamp).transpose()
}

/// 読み取り後に書き込むトランザクションの開始文
///
/// 書き込みロックを先に取り、同一行への同時登録を直列化する。
pub(crate) const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// 一意制約違反か
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
