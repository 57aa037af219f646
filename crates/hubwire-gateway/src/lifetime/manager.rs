//! Single-writer registry of hub connections.
//!
//! At most one slot exists per hub ID. A second connection for the same hub
//! asks the current holder to disconnect and polls for the slot to free up,
//! giving up with [`AcquireOutcome::Busy`] after a bounded number of tries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::hub::HubHandle;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifetimeError {
    #[error("Gateway is shutting down")]
    ShuttingDown,
}

#[derive(Debug)]
pub enum AcquireOutcome {
    Acquired(SlotLease),
    /// The previous holder did not release in time.
    Busy,
}

impl AcquireOutcome {
    pub const fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

struct Slot {
    token: u64,
    handle: HubHandle,
    created_at: DateTime<Utc>,
}

struct Inner {
    slots: Mutex<HashMap<String, Slot>>,
    next_token: AtomicU64,
    shutting_down: AtomicBool,
    attempts: u32,
    backoff: Duration,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, hub_id: &str, token: u64) -> bool {
        let mut slots = self.slots();
        if slots.get(hub_id).is_some_and(|s| s.token == token) {
            slots.remove(hub_id);
            info!(hub_id = %hub_id, "Hub slot released");
            true
        } else {
            false
        }
    }
}

/// Cheaply cloneable; all clones share one slot table.
#[derive(Clone)]
pub struct HubLifetimeManager {
    inner: Arc<Inner>,
}

impl HubLifetimeManager {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                shutting_down: AtomicBool::new(false),
                attempts: attempts.max(1),
                backoff,
            }),
        }
    }

    /// Claim the slot for `handle.hub_id()`.
    ///
    /// An existing holder is asked to disconnect once; the slot table is then
    /// polled `attempts` times with `backoff` between polls.
    pub async fn try_acquire(&self, handle: HubHandle) -> Result<AcquireOutcome, LifetimeError> {
        let hub_id = handle.hub_id().to_string();
        let mut displaced: Option<HubHandle> = None;

        for attempt in 0..=self.inner.attempts {
            if self.inner.shutting_down.load(Ordering::SeqCst) {
                return Err(LifetimeError::ShuttingDown);
            }

            let holder = {
                let mut slots = self.inner.slots();
                match slots.get(&hub_id) {
                    None => {
                        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
                        slots.insert(
                            hub_id.clone(),
                            Slot {
                                token,
                                handle,
                                created_at: Utc::now(),
                            },
                        );
                        drop(slots);
                        info!(hub_id = %hub_id, attempt, "Hub slot acquired");
                        return Ok(AcquireOutcome::Acquired(SlotLease {
                            manager: Arc::clone(&self.inner),
                            hub_id,
                            token,
                            released: false,
                        }));
                    }
                    Some(slot) => slot.handle.clone(),
                }
            };

            if displaced.is_none() {
                debug!(hub_id = %hub_id, "Slot held, asking previous connection to disconnect");
                holder.disconnect();
                displaced = Some(holder);
            }

            if attempt < self.inner.attempts {
                tokio::time::sleep(self.inner.backoff).await;
            }
        }

        warn!(hub_id = %hub_id, attempts = self.inner.attempts, "Hub slot still held, refusing connection");
        Ok(AcquireOutcome::Busy)
    }

    pub fn get(&self, hub_id: &str) -> Option<HubHandle> {
        self.inner.slots().get(hub_id).map(|s| s.handle.clone())
    }

    pub fn is_connected(&self, hub_id: &str) -> bool {
        self.inner.slots().contains_key(hub_id)
    }

    pub fn slot_created_at(&self, hub_id: &str) -> Option<DateTime<Utc>> {
        self.inner.slots().get(hub_id).map(|s| s.created_at)
    }

    pub fn connection_count(&self) -> usize {
        self.inner.slots().len()
    }

    pub fn connected_hubs(&self) -> Vec<String> {
        self.inner.slots().keys().cloned().collect()
    }

    /// Refuse new acquisitions. Existing slots drain on their own.
    pub fn begin_shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }
}

/// Ownership of one slot. Released explicitly or on drop, exactly once.
pub struct SlotLease {
    manager: Arc<Inner>,
    hub_id: String,
    token: u64,
    released: bool,
}

impl SlotLease {
    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    /// Free the slot. Returns `true` only on the call that freed it.
    pub fn release(&mut self) -> bool {
        if std::mem::replace(&mut self.released, true) {
            return false;
        }
        self.manager.release(&self.hub_id, self.token)
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLease")
            .field("hub_id", &self.hub_id)
            .field("token", &self.token)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    use crate::hub::{HubIdentity, ProtocolVariant};

    fn handle(hub_id: &str) -> HubHandle {
        let (handle, mailbox) = HubHandle::new(
            HubIdentity {
                hub_id: hub_id.into(),
                owner_id: "owner-1".into(),
            },
            semver::Version::new(1, 0, 0),
            ProtocolVariant::V2,
            &CancellationToken::new(),
            4,
        );
        drop(mailbox);
        handle
    }

    fn manager() -> HubLifetimeManager {
        HubLifetimeManager::new(10, Duration::from_millis(50))
    }

    async fn acquire(manager: &HubLifetimeManager, h: HubHandle) -> SlotLease {
        match manager.try_acquire(h).await.unwrap() {
            AcquireOutcome::Acquired(lease) => lease,
            AcquireOutcome::Busy => panic!("expected acquisition"),
        }
    }

    #[tokio::test]
    async fn first_acquisition_wins_the_slot() {
        let manager = manager();
        let h = handle("hub-1");
        let _lease = acquire(&manager, h.clone()).await;
        assert!(manager.get("hub-1").unwrap().same_connection(&h));
        assert!(manager.slot_created_at("hub-1").is_some());
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let manager = manager();
        let mut lease = acquire(&manager, handle("hub-1")).await;
        assert!(lease.release());
        assert!(!lease.release());
        drop(lease);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn stale_lease_does_not_free_a_newer_slot() {
        let manager = manager();
        let mut old = acquire(&manager, handle("hub-1")).await;
        assert!(old.release());
        let newer = handle("hub-1");
        let _new_lease = acquire(&manager, newer.clone()).await;

        assert!(!old.release());
        drop(old);
        assert!(manager.get("hub-1").unwrap().same_connection(&newer));
    }

    #[tokio::test(start_paused = true)]
    async fn holder_that_never_leaves_yields_busy() {
        let manager = manager();
        let first = handle("hub-1");
        let _lease = acquire(&manager, first.clone()).await;

        let outcome = manager.try_acquire(handle("hub-1")).await.unwrap();
        assert!(matches!(outcome, AcquireOutcome::Busy));
        assert!(first.is_displaced(), "holder must have been asked to leave");
        assert!(manager.get("hub-1").unwrap().same_connection(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn cooperative_holder_is_displaced() {
        let manager = manager();
        let first = handle("hub-1");
        let lease = acquire(&manager, first.clone()).await;

        let token = first.cancellation().clone();
        let holder = tokio::spawn(async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(120)).await;
            drop(lease);
        });

        let second = handle("hub-1");
        let _lease = acquire(&manager, second.clone()).await;
        holder.await.unwrap();
        assert!(manager.get("hub-1").unwrap().same_connection(&second));
        assert!(!second.is_displaced());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquisitions_yield_one_holder() {
        let manager = manager();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager.try_acquire(handle("hub-1")).await.unwrap()
            }));
        }

        let mut leases = Vec::new();
        let mut busy = 0;
        for task in tasks {
            match task.await.unwrap() {
                AcquireOutcome::Acquired(lease) => leases.push(lease),
                AcquireOutcome::Busy => busy += 1,
            }
        }
        assert_eq!(leases.len(), 1);
        assert_eq!(busy, 7);
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_acquisitions() {
        let manager = manager();
        manager.begin_shutdown();
        assert_eq!(
            manager.try_acquire(handle("hub-1")).await.unwrap_err(),
            LifetimeError::ShuttingDown
        );
    }

    #[tokio::test]
    async fn different_hubs_do_not_contend() {
        let manager = manager();
        let _a = acquire(&manager, handle("hub-a")).await;
        let _b = acquire(&manager, handle("hub-b")).await;
        let mut hubs = manager.connected_hubs();
        hubs.sort();
        assert_eq!(hubs, vec!["hub-a".to_string(), "hub-b".to_string()]);
    }
}
