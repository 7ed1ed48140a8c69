//! KV/Set store contract (spec C1).
//!
//! Two backends are expected: an in-process map-based store (tests, single
//! node deployment) and a shared store (Redis-compatible, feature
//! `redis-store`). The DWM and selectors never assume which is behind the
//! trait object.

pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use memory::MemoryStore;

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "key not found"),
            StoreError::Backend(message) => write!(f, "store backend error: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

/// Thread-safe KV/Set primitives with TTL, per spec §4.1.
///
/// `LLen` is used only as a "has active keys" probe; on any error callers
/// treat the sub-group as *available* (fail-open) rather than propagating
/// the error — selection must not be starved by telemetry-store outages.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError>;
    async fn del(&self, keys: &[&str]) -> Result<(), StoreError>;
    async fn sadd(&self, set: &str, members: &[&str]) -> Result<(), StoreError>;
    async fn spopn(&self, set: &str, n: usize) -> Result<Vec<String>, StoreError>;
    async fn llen(&self, list_key: &str) -> Result<i64, StoreError>;
    async fn lpush(&self, list_key: &str, items: &[&str]) -> Result<(), StoreError>;
}

/// Key for the per-sub-group active-key probe list (spec §6, item 4).
pub fn active_keys_key(group_id: u64) -> String {
    format!("group:{}:active_keys", group_id)
}

/// Persisted metrics key for an aggregate sub-group (spec §6).
pub fn sub_group_metrics_key(agg_id: u64, sub_id: u64) -> String {
    format!("dwm:sub:{}:{}", agg_id, sub_id)
}

/// Persisted metrics key for a model-redirect target (spec §6).
///
/// `target_key` is the target *model name*, per the implementer's choice
/// recorded in DESIGN.md (index-based keys are invalidated by rule edits).
pub fn model_redirect_metrics_key(group_id: u64, source_model: &str, target_key: &str) -> String {
    format!("dwm:mr:{}:{}:{}", group_id, source_model, target_key)
}
