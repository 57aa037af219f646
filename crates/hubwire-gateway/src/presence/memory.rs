//! Single-node presence store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{PresenceError, PresenceRecord, PresenceStore};

/// In-process presence store with lazy expiry on the tokio clock.
#[derive(Default)]
pub struct InMemoryPresenceStore {
    records: Mutex<HashMap<String, (PresenceRecord, Instant)>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.records
            .lock()
            .await
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn get(&self, hub_id: &str) -> Result<Option<PresenceRecord>, PresenceError> {
        let mut records = self.records.lock().await;
        match records.get(hub_id) {
            Some((record, expires)) if *expires > Instant::now() => Ok(Some(record.clone())),
            Some(_) => {
                records.remove(hub_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, record: &PresenceRecord, ttl: Duration) -> Result<(), PresenceError> {
        self.records
            .lock()
            .await
            .insert(record.id.clone(), (record.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn refresh(&self, hub_id: &str, ttl: Duration) -> Result<bool, PresenceError> {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        match records.get_mut(hub_id) {
            Some((_, expires)) if *expires > now => {
                *expires = now + ttl;
                Ok(true)
            }
            Some(_) => {
                records.remove(hub_id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, hub_id: &str, gateway: &str) -> Result<bool, PresenceError> {
        let mut records = self.records.lock().await;
        if records
            .get(hub_id)
            .is_some_and(|(record, _)| record.gateway == gateway)
        {
            records.remove(hub_id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    const TTL: Duration = Duration::from_secs(65);

    fn record(gateway: &str) -> PresenceRecord {
        PresenceRecord {
            id: "hub-1".into(),
            owner: "owner-1".into(),
            gateway: gateway.into(),
            firmware_version: None,
            connected_at: Utc::now(),
            booted_at: Utc::now(),
            latency_ms: None,
            rssi: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn record_expires_after_ttl() {
        let store = InMemoryPresenceStore::new();
        store.upsert(&record("gw-a"), TTL).await.unwrap();

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert!(store.get("hub-1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("hub-1").await.unwrap().is_none());
        assert!(!store.refresh("hub-1", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_readability() {
        let store = InMemoryPresenceStore::new();
        store.upsert(&record("gw-a"), TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(store.refresh("hub-1", TTL).await.unwrap());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(store.get("hub-1").await.unwrap().is_some());
        assert_eq!(store.len().await, 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get("hub-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_only_for_owning_gateway() {
        let store = InMemoryPresenceStore::new();
        store.upsert(&record("gw-b"), TTL).await.unwrap();

        assert!(!store.remove("hub-1", "gw-a").await.unwrap());
        assert!(store.get("hub-1").await.unwrap().is_some());
        assert!(store.remove("hub-1", "gw-b").await.unwrap());
        assert!(store.get("hub-1").await.unwrap().is_none());
    }
}
