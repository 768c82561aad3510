mod memory;
mod redis;

pub use self::memory::MemorySlotStore;
pub use self::redis::RedisSlotStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::slot::{Field, SlotKey};

/// Per-channel, per-slot mailbox state with field-level atomic mutation and
/// whole-key TTL. The rendezvous engine is the only writer; implementations
/// must make each operation atomic with respect to other operations on the
/// same key.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get_field(&self, key: &SlotKey, field: Field) -> Result<Option<Vec<u8>>>;

    /// Set fields on a slot hash, creating the key if absent. Creating a key
    /// does not give it a TTL; that is `expire`'s job.
    async fn set_fields(&self, key: &SlotKey, fields: Vec<(Field, Vec<u8>)>) -> Result<()>;

    /// Delete one field, returning how many were removed. When `permissive`
    /// is false, an absent field is a store failure.
    async fn delete_field(&self, key: &SlotKey, field: Field, permissive: bool) -> Result<u64>;

    /// Reset the key's TTL. Fails if the key does not exist.
    async fn expire(&self, key: &SlotKey, seconds: u64) -> Result<()>;

    async fn exists(&self, key: &SlotKey) -> Result<bool>;

    /// Whole-hash snapshot of one slot.
    async fn fields(&self, key: &SlotKey) -> Result<HashMap<String, Vec<u8>>>;

    /// Directory of live slot keys, for status introspection.
    async fn channels(&self) -> Result<Vec<SlotKey>>;
}
