use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{BridgeError, Result};
use crate::slot::{Field, SlotKey};
use crate::store::SlotStore;

#[derive(Debug, Clone, Default)]
struct Entry {
    fields: HashMap<String, Vec<u8>>,
    /// `None` means the key persists until an explicit `expire`.
    deadline: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= Instant::now())
    }
}

/// In-memory slot store. A `HashMap` behind an `RwLock`, with lazy TTL:
/// an entry whose deadline has passed is treated as absent and swept on the
/// next write that touches it.
///
/// Backs the test suites, and serves single-node deployments that have no
/// Redis nearby. Mutating operations take the write lock; reads and status
/// snapshots take the read lock.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn get_field(&self, key: &SlotKey, field: Field) -> Result<Option<Vec<u8>>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(&key.to_string())
            .filter(|entry| !entry.expired())
            .and_then(|entry| entry.fields.get(field.as_str()).cloned()))
    }

    async fn set_fields(&self, key: &SlotKey, fields: Vec<(Field, Vec<u8>)>) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = key.to_string();
        if map.get(&slot).is_some_and(Entry::expired) {
            map.remove(&slot);
        }
        let entry = map.entry(slot).or_default();
        for (field, value) in fields {
            entry.fields.insert(field.as_str().to_string(), value);
        }
        Ok(())
    }

    async fn delete_field(&self, key: &SlotKey, field: Field, permissive: bool) -> Result<u64> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = key.to_string();
        if map.get(&slot).is_some_and(Entry::expired) {
            map.remove(&slot);
        }
        let deleted = map
            .get_mut(&slot)
            .and_then(|entry| entry.fields.remove(field.as_str()))
            .map_or(0, |_| 1);
        if deleted != 1 && !permissive {
            return Err(BridgeError::Store(format!(
                "failed deleting {slot} subkey {field}"
            )));
        }
        Ok(deleted)
    }

    async fn expire(&self, key: &SlotKey, seconds: u64) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let slot = key.to_string();
        if map.get(&slot).is_some_and(Entry::expired) {
            map.remove(&slot);
        }
        match map.get_mut(&slot) {
            Some(entry) => {
                entry.deadline = Some(Instant::now() + Duration::from_secs(seconds));
                Ok(())
            }
            None => Err(BridgeError::Store(format!("failed expiring {slot}"))),
        }
    }

    async fn exists(&self, key: &SlotKey) -> Result<bool> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(&key.to_string())
            .is_some_and(|entry| !entry.expired()))
    }

    async fn fields(&self, key: &SlotKey) -> Result<HashMap<String, Vec<u8>>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .get(&key.to_string())
            .filter(|entry| !entry.expired())
            .map(|entry| entry.fields.clone())
            .unwrap_or_default())
    }

    async fn channels(&self) -> Result<Vec<SlotKey>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map
            .iter()
            .filter(|(_, entry)| !entry.expired())
            .filter_map(|(raw, _)| SlotKey::parse(raw))
            .collect())
    }
}
