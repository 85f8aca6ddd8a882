//! Response cache for collaborator calls.
//!
//! Identical inputs to the same collaborator and model are answered from
//! memory, which also keeps repeated evaluations of one claim identical.
//! Only successful responses are cached; degraded values never are.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::collaborator::Collaborator;
use crate::config::CacheConfig;

/// Cache key: who was asked, with which model, about what.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    collaborator: Collaborator,
    model: String,
    input_hash: u64,
}

impl CacheKey {
    /// Key for a text-model call.
    pub fn for_text(collaborator: Collaborator, model: &str, input: &str) -> Self {
        Self::new(collaborator, model, |h| input.hash(h))
    }

    /// Key for a labeling call, hashed over the raw image bytes.
    pub fn for_image(labeler: &str, image: &[u8]) -> Self {
        Self::new(Collaborator::Labeler, labeler, |h| image.hash(h))
    }

    fn new(collaborator: Collaborator, model: &str, feed: impl FnOnce(&mut DefaultHasher)) -> Self {
        let mut hasher = DefaultHasher::new();
        feed(&mut hasher);
        Self {
            collaborator,
            model: model.to_string(),
            input_hash: hasher.finish(),
        }
    }

    pub fn collaborator(&self) -> Collaborator {
        self.collaborator
    }
}

/// A cached collaborator answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedValue {
    Labels(Vec<String>),
    Completion(String),
}

/// Collaborator response cache using moka.
pub struct ResponseCache {
    cache: Cache<CacheKey, CachedValue>,
}

impl ResponseCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, value: CachedValue) {
        self.cache.insert(key, value).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
