//! Redis-backed presence store shared by every gateway.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{PresenceError, PresenceRecord, PresenceStore};

const KEY_PREFIX: &str = "hubwire:presence";

/// Deletes the record only while its `gateway` field matches ARGV[1].
const REMOVE_IF_OWNED: &str = r"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local ok, record = pcall(cjson.decode, raw)
if ok and record.gateway == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
";

#[derive(Clone)]
pub struct RedisPresenceStore {
    connection: ConnectionManager,
    remove_script: redis::Script,
}

impl RedisPresenceStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            remove_script: redis::Script::new(REMOVE_IF_OWNED),
        }
    }

    fn key(hub_id: &str) -> String {
        format!("{KEY_PREFIX}:{hub_id}")
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn get(&self, hub_id: &str) -> Result<Option<PresenceRecord>, PresenceError> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn.get(Self::key(hub_id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(PresenceError::from))
            .transpose()
    }

    async fn upsert(&self, record: &PresenceRecord, ttl: Duration) -> Result<(), PresenceError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.connection.clone();
        let () = conn
            .set_ex(Self::key(&record.id), payload, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn refresh(&self, hub_id: &str, ttl: Duration) -> Result<bool, PresenceError> {
        let mut conn = self.connection.clone();
        let secs = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);
        let refreshed: bool = conn.expire(Self::key(hub_id), secs).await?;
        Ok(refreshed)
    }

    async fn remove(&self, hub_id: &str, gateway: &str) -> Result<bool, PresenceError> {
        let mut conn = self.connection.clone();
        let removed: i64 = self
            .remove_script
            .key(Self::key(hub_id))
            .arg(gateway)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }
}
