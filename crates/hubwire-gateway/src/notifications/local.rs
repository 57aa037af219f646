//! In-process owner notifications for single-node mode.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{HubEvent, NotifyError, OwnerNotifier};

/// An event together with the owner it is addressed to.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerEvent {
    pub owner_id: String,
    pub event: HubEvent,
}

pub struct LocalOwnerNotifier {
    tx: broadcast::Sender<OwnerEvent>,
}

impl LocalOwnerNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OwnerEvent> {
        self.tx.subscribe()
    }
}

impl Default for LocalOwnerNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl OwnerNotifier for LocalOwnerNotifier {
    async fn notify(&self, owner_id: &str, event: &HubEvent) -> Result<(), NotifyError> {
        // No subscribers is not an error.
        let _ = self.tx.send(OwnerEvent {
            owner_id: owner_id.to_string(),
            event: event.clone(),
        });
        Ok(())
    }
}
