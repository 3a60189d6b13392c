//! skip/limit形式のページング

use serde::Deserialize;

/// 一覧系APIのデフォルト件数
pub const DEFAULT_LIMIT: i64 = 100;
/// コメント一覧のデフォルト件数
pub const DEFAULT_COMMENT_LIMIT: i64 = 50;
/// 1リクエストで返す最大件数
pub const MAX_LIMIT: i64 = 100;

/// クエリパラメータ `?skip=&limit=`
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    /// 読み飛ばす件数
    pub skip: Option<i64>,
    /// 取得件数
    pub limit: Option<i64>,
}

/// 正規化済みのページ指定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// 読み飛ばす件数（0以上）
    pub skip: i64,
    /// 取得件数（1以上`MAX_LIMIT`以下）
    pub limit: i64,
}

impl Page {
    /// 未指定・範囲外の値を補正してページ指定を作る
    pub fn new(skip: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }
}

impl PageParams {
    /// デフォルト件数を指定して正規化する
    pub fn page(&self, default_limit: i64) -> Page {
        Page::new(self.skip, self.limit, default_limit)
    }
}
