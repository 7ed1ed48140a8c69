use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{Store, StoreError};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(t) if Instant::now() >= t)
    }
}

/// In-process map-based store, for unit tests and single-node deployment.
///
/// Keyed maps use `dashmap` for lock-free sharded access; list/set values
/// are guarded by a small per-entry mutex since `LPush`/`SPopN` mutate a
/// `Vec`/`HashSet` in place rather than replacing the whole value.
#[derive(Default)]
pub struct MemoryStore {
    kv: DashMap<String, Entry>,
    lists: DashMap<String, Mutex<Vec<String>>>,
    sets: DashMap<String, Mutex<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        match self.kv.get(key) {
            Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
            Some(_) => {
                self.kv.remove(key);
                Err(StoreError::NotFound)
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.kv.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.kv.remove(*key);
            self.lists.remove(*key);
            self.sets.remove(*key);
        }
        Ok(())
    }

    async fn sadd(&self, set: &str, members: &[&str]) -> Result<(), StoreError> {
        let entry = self.sets.entry(set.to_string()).or_default();
        let mut guard = entry.lock();
        for member in members {
            guard.insert(member.to_string());
        }
        Ok(())
    }

    async fn spopn(&self, set: &str, n: usize) -> Result<Vec<String>, StoreError> {
        let Some(entry) = self.sets.get(set) else {
            return Ok(Vec::new());
        };
        let mut guard = entry.lock();
        let popped: Vec<String> = guard.iter().take(n).cloned().collect();
        for member in &popped {
            guard.remove(member);
        }
        Ok(popped)
    }

    async fn llen(&self, list_key: &str) -> Result<i64, StoreError> {
        match self.lists.get(list_key) {
            Some(entry) => Ok(entry.lock().len() as i64),
            None => Ok(0),
        }
    }

    async fn lpush(&self, list_key: &str, items: &[&str]) -> Result<(), StoreError> {
        let entry = self.lists.entry(list_key.to_string()).or_default();
        let mut guard = entry.lock();
        for item in items.iter().rev() {
            guard.insert(0, item.to_string());
        }
        Ok(())
    }
}
