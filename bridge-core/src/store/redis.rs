use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::slot::{Field, SlotKey};
use crate::store::SlotStore;

/// Slot store backed by a Redis hash per slot key, with `EXPIRE` providing
/// the channel TTL. Every operation is a single Redis command, so atomicity
/// per key comes for free.
#[derive(Clone)]
pub struct RedisSlotStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisSlotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSlotStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisSlotStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis slot store at {}", redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| BridgeError::Store(format!("failed to create Redis client: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| BridgeError::Store(format!("failed to connect to Redis: {e}")))?;

        info!("Successfully connected to Redis slot store");

        Ok(Self { conn })
    }
}

#[async_trait]
impl SlotStore for RedisSlotStore {
    async fn get_field(&self, key: &SlotKey, field: Field) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.hget(key.to_string(), field.as_str())
            .await
            .map_err(|e| BridgeError::Store(format!("Redis HGET failed: {e}")))
    }

    async fn set_fields(&self, key: &SlotKey, fields: Vec<(Field, Vec<u8>)>) -> Result<()> {
        let mut conn = self.conn.clone();
        let items: Vec<(&str, Vec<u8>)> = fields
            .into_iter()
            .map(|(field, value)| (field.as_str(), value))
            .collect();
        conn.hset_multiple::<_, _, _, ()>(key.to_string(), &items)
            .await
            .map_err(|e| BridgeError::Store(format!("Redis HSET failed setting {key}: {e}")))?;
        Ok(())
    }

    async fn delete_field(&self, key: &SlotKey, field: Field, permissive: bool) -> Result<u64> {
        let mut conn = self.conn.clone();
        let deleted: u64 = conn
            .hdel(key.to_string(), field.as_str())
            .await
            .map_err(|e| BridgeError::Store(format!("Redis HDEL failed: {e}")))?;
        if deleted != 1 && !permissive {
            return Err(BridgeError::Store(format!(
                "failed deleting {key} subkey {field}"
            )));
        }
        Ok(deleted)
    }

    async fn expire(&self, key: &SlotKey, seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let applied: i64 = conn
            .expire(key.to_string(), seconds as i64)
            .await
            .map_err(|e| BridgeError::Store(format!("Redis EXPIRE failed: {e}")))?;
        if applied != 1 {
            return Err(BridgeError::Store(format!("failed expiring {key}")));
        }
        Ok(())
    }

    async fn exists(&self, key: &SlotKey) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key.to_string())
            .await
            .map_err(|e| BridgeError::Store(format!("Redis EXISTS failed: {e}")))
    }

    async fn fields(&self, key: &SlotKey) -> Result<HashMap<String, Vec<u8>>> {
        let mut conn = self.conn.clone();
        conn.hgetall(key.to_string())
            .await
            .map_err(|e| BridgeError::Store(format!("Redis HGETALL failed: {e}")))
    }

    async fn channels(&self) -> Result<Vec<SlotKey>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<SlotKey> = Vec::new();
        for pattern in ["*:request", "*:reply"] {
            let raw: Vec<String> = conn
                .keys(pattern)
                .await
                .map_err(|e| BridgeError::Store(format!("Redis KEYS failed: {e}")))?;
            debug!("{} keys match {}", raw.len(), pattern);
            keys.extend(raw.iter().filter_map(|k| SlotKey::parse(k)));
        }
        Ok(keys)
    }
}
