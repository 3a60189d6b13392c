//! 読み取りキャッシュ
//!
//! キャッシュバックエンドは`CacheStore`トレイトの背後に隠す。
//! 読み取り系APIは`get_json`で引き、ミス時にDBから取得して`set_json`で格納する。
//! 更新系APIはキーのパターンで関連エントリを消す。

pub mod keys;
pub mod memory;

use crate::common::error::HubError;
use async_trait::async_trait;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryCache;

/// キー・バリュー型キャッシュのバックエンド
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 値を取得する（期限切れ・未登録はNone）
    async fn get(&self, key: &str) -> Result<Option<String>, HubError>;

    /// 有効期間付きで値を格納する
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), HubError>;

    /// キーを削除する（存在しなければfalse）
    async fn delete(&self, key: &str) -> Result<bool, HubError>;

    /// `*`を含むグロブパターンに一致するキーをすべて削除し、削除件数を返す
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, HubError>;
}

/// 共有キャッシュハンドル
pub type SharedCache = Arc<dyn CacheStore>;

/// JSONとして格納された値を取得する
///
/// バックエンドの障害や壊れた値はミス扱いにする。
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, "Discarding undecodable cache entry: {}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, "Cache lookup failed: {}", e);
            None
        }
    }
}

/// 値をJSONにして格納する（失敗はログのみ）
pub async fn set_json<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(key, "Failed to serialize cache entry: {}", e);
            return;
        }
    };
    if let Err(e) = cache.set(key, raw, ttl).await {
        tracing::warn!(key, "Cache store failed: {}", e);
    }
}

/// パターンに一致するエントリを無効化する（失敗はログのみ）
pub async fn invalidate(cache: &dyn CacheStore, patterns: &[&str]) {
    for pattern in patterns {
        match cache.delete_pattern(pattern).await {
            Ok(removed) => tracing::debug!(pattern, removed, "cache invalidated"),
            Err(e) => tracing::warn!(pattern, "Cache invalidation failed: {}", e),
        }
    }
}

/// 単一キーを無効化する（失敗はログのみ）
pub async fn invalidate_key(cache: &dyn CacheStore, key: &str) {
    if let Err(e) = cache.delete(key).await {
        tracing::warn!(key, "Cache delete failed: {}", e);
    }
}

/// `*`だけを特殊文字とするキーパターン
///
/// `*`以外の文字はエスケープして正規表現に変換し、全体一致で評価する。
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// パターンをコンパイルする
    pub fn new(pattern: &str) -> Result<Self, HubError> {
        let body = regex::escape(pattern).replace(r"\*", ".*");
        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| HubError::Cache(format!("Invalid key pattern '{}': {}", pattern, e)))?;
        Ok(Self { regex })
    }

    /// キーがパターンに一致するか
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

/// パターンとキーの一致判定（コンパイルできないパターンは何にも一致しない）
#[cfg(test)]
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    KeyPattern::new(pattern).is_ok_and(|p| p.matches(text))
}
