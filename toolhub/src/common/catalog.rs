//! ツールカタログのドメイン型
//!
//! ツール本体、評価、コメント、コメント投票を表す。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ツールのカテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// 開発
    Development,
    /// デザイン
    Design,
    /// 生産性
    Productivity,
    /// コミュニケーション
    Communication,
    /// 分析
    Analytics,
    /// その他
    Other,
}

impl ToolCategory {
    /// すべてのカテゴリ
    pub const ALL: [ToolCategory; 6] = [
        ToolCategory::Development,
        ToolCategory::Design,
        ToolCategory::Productivity,
        ToolCategory::Communication,
        ToolCategory::Analytics,
        ToolCategory::Other,
    ];

    /// DB格納用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Design => "design",
            Self::Productivity => "productivity",
            Self::Communication => "communication",
            Self::Analytics => "analytics",
            Self::Other => "other",
        }
    }

    /// 文字列からカテゴリに変換
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// ツールのモデレーション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// 承認待ち
    Pending,
    /// 承認済み
    Approved,
    /// 却下
    Rejected,
}

impl ToolStatus {
    /// すべての状態
    pub const ALL: [ToolStatus; 3] = [
        ToolStatus::Pending,
        ToolStatus::Approved,
        ToolStatus::Rejected,
    ];

    /// DB格納用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// 文字列から状態に変換
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

/// ツール
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// ツールID
    pub id: i64,
    /// 名前
    pub name: String,
    /// 説明
    pub description: String,
    /// カテゴリ
    pub category: ToolCategory,
    /// モデレーション状態
    pub status: ToolStatus,
    /// 公式サイトなどのURL
    pub url: Option<String>,
    /// 投稿者ID（ユーザー削除後はNone）
    pub created_by: Option<i64>,
    /// 投稿者のユーザー名
    pub created_by_username: Option<String>,
    /// 承認・却下したモデレーターID
    pub approved_by: Option<i64>,
    /// 却下理由
    pub rejection_reason: Option<String>,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 更新日時
    pub updated_at: DateTime<Utc>,
    /// 平均評価（小数第2位で丸め）
    pub average_rating: f64,
    /// 評価件数
    pub total_ratings: i64,
    /// 評価の分布（詳細取得時のみ）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_distribution: Option<BTreeMap<String, i64>>,
}

/// 評価
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    /// 評価ID
    pub id: i64,
    /// 対象ツールID
    pub tool_id: i64,
    /// 評価したユーザーID
    pub user_id: i64,
    /// 評価したユーザー名
    pub username: Option<String>,
    /// 評価値（1〜5）
    pub rating: i64,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 更新日時
    pub updated_at: DateTime<Utc>,
}

/// 評価値の下限
pub const MIN_RATING: i64 = 1;
/// 評価値の上限
pub const MAX_RATING: i64 = 5;

/// ツールの評価統計
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    /// 平均評価（小数第2位で丸め）
    pub average_rating: f64,
    /// 評価件数
    pub total_ratings: i64,
    /// 評価値ごとの件数（"1"〜"5"）
    pub rating_distribution: BTreeMap<String, i64>,
}

impl RatingStats {
    /// (評価値, 件数)の組から統計を計算する
    ///
    /// 範囲外の評価値は無視する。件数0の場合は平均0.0。
    pub fn from_counts(counts: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let mut rating_distribution: BTreeMap<String, i64> = (MIN_RATING..=MAX_RATING)
            .map(|r| (r.to_string(), 0))
            .collect();
        let mut total = 0i64;
        let mut sum = 0i64;

        for (rating, count) in counts {
            if !(MIN_RATING..=MAX_RATING).contains(&rating) || count <= 0 {
                continue;
            }
            *rating_distribution.entry(rating.to_string()).or_insert(0) += count;
            total += count;
            sum += rating * count;
        }

        let average_rating = if total == 0 {
            0.0
        } else {
            round2(sum as f64 / total as f64)
        };

        Self {
            average_rating,
            total_ratings: total,
            rating_distribution,
        }
    }
}

/// 小数第2位で丸める
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// コメント
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// コメントID
    pub id: i64,
    /// 対象ツールID
    pub tool_id: i64,
    /// 投稿者ID
    pub user_id: i64,
    /// 投稿者のユーザー名
    pub username: Option<String>,
    /// 本文
    pub content: String,
    /// 賛成票数
    pub upvotes: i64,
    /// 反対票数
    pub downvotes: i64,
    /// 作成日時
    pub created_at: DateTime<Utc>,
    /// 更新日時
    pub updated_at: DateTime<Utc>,
}

/// コメントへの投票種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    /// 賛成
    Up,
    /// 反対
    Down,
}

impl VoteType {
    /// DB格納用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// 文字列から投票種別に変換
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// 投票の変更に伴うカウンタの増減 `(upvotes, downvotes)` を返す
///
/// `previous`はこれまでの票、`next`は変更後の票（取り消しはNone）。
pub fn vote_delta(previous: Option<VoteType>, next: Option<VoteType>) -> (i64, i64) {
    let weight = |vote: Option<VoteType>| match vote {
        Some(VoteType::Up) => (1, 0),
        Some(VoteType::Down) => (0, 1),
        None => (0, 0),
    };
    let (prev_up, prev_down) = weight(previous);
    let (next_up, next_down) = weight(next);
    (next_up - prev_up, next_down - prev_down)
}
