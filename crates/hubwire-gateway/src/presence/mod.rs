//! Presence registry: one TTL-bound record per online hub.
//!
//! A record's absence is the platform-wide "hub is offline" signal, so the
//! owning hub actor refreshes it on every accepted keep-alive.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::memory::InMemoryPresenceStore;
pub use self::redis_store::RedisPresenceStore;

use crate::hub::protocol::boot_time_changed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub id: String,
    pub owner: String,
    /// FQDN of the gateway holding the hub's connection.
    pub gateway: String,
    pub firmware_version: Option<semver::Version>,
    pub connected_at: DateTime<Utc>,
    pub booted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
}

impl PresenceRecord {
    /// Whether `next` carries a change worth rewriting the record for.
    pub fn differs_from(&self, next: &Self) -> bool {
        self.id != next.id
            || self.owner != next.owner
            || self.gateway != next.gateway
            || self.firmware_version != next.firmware_version
            || self.connected_at != next.connected_at
            || self.latency_ms != next.latency_ms
            || self.rssi != next.rssi
            || boot_time_changed(self.booted_at, next.booted_at)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Presence backend error: {0}")]
    Backend(String),

    #[error("Malformed presence record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for PresenceError {
    fn from(e: ::redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn get(&self, hub_id: &str) -> Result<Option<PresenceRecord>, PresenceError>;

    /// Write `record` and (re)start its TTL.
    async fn upsert(&self, record: &PresenceRecord, ttl: Duration) -> Result<(), PresenceError>;

    /// Restart the TTL of an existing record. Returns `false` if it expired.
    async fn refresh(&self, hub_id: &str, ttl: Duration) -> Result<bool, PresenceError>;

    /// Remove the record if `gateway` still owns it.
    async fn remove(&self, hub_id: &str, gateway: &str) -> Result<bool, PresenceError>;
}
