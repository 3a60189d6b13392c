//! プロセス内キャッシュ実装

use super::{CacheStore, KeyPattern};
use crate::common::error::HubError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 有効期限付きのインメモリキャッシュ
///
/// 期限切れエントリは読み取り時に不在として扱い、書き込み時にまとめて掃除する。
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    /// 空のキャッシュを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 期限切れを含む保持エントリ数
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// エントリが無いか
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, HubError> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), HubError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, HubError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        Ok(entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, HubError> {
        let pattern = KeyPattern::new(pattern)?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !pattern.matches(key));
        Ok(before - entries.len())
    }
}
