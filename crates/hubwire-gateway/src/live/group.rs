//! Live sessions grouped by hub, for broadcasts such as latency announcements.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use super::messages::LiveResponse;

const GROUP_CAPACITY: usize = 64;

type GroupMap = HashMap<String, broadcast::Sender<LiveResponse>>;

#[derive(Clone, Default)]
pub struct LiveGroups {
    groups: Arc<Mutex<GroupMap>>,
}

impl LiveGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GroupMap> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the group of `hub_id`, creating it on first join.
    pub fn join(&self, hub_id: &str) -> GroupMembership {
        let mut groups = self.lock();
        let sender = groups
            .entry(hub_id.to_string())
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0);
        let receiver = sender.subscribe();
        GroupMembership {
            groups: self.clone(),
            hub_id: hub_id.to_string(),
            sender: sender.clone(),
            receiver,
        }
    }

    /// Send to every session of `hub_id`. Returns the number of receivers.
    pub fn broadcast(&self, hub_id: &str, message: LiveResponse) -> usize {
        self.lock()
            .get(hub_id)
            .and_then(|tx| tx.send(message).ok())
            .unwrap_or(0)
    }

    pub fn session_count(&self, hub_id: &str) -> usize {
        self.lock().get(hub_id).map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn group_count(&self) -> usize {
        self.lock().len()
    }
}

/// One session's subscription. Leaving the last membership drops the group.
pub struct GroupMembership {
    groups: LiveGroups,
    hub_id: String,
    sender: broadcast::Sender<LiveResponse>,
    receiver: broadcast::Receiver<LiveResponse>,
}

impl GroupMembership {
    pub fn broadcast(&self, message: LiveResponse) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub async fn recv(&mut self) -> Result<LiveResponse, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for GroupMembership {
    fn drop(&mut self) {
        let mut groups = self.groups.lock();
        // Our own receiver is still alive here.
        if self.sender.receiver_count() <= 1 {
            groups.remove(&self.hub_id);
        }
    }
}
