//! Owner notifications over Redis pub/sub.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{HubEvent, NotifyError, OwnerNotifier, owner_channel};

#[derive(Clone)]
pub struct RedisOwnerNotifier {
    connection: ConnectionManager,
}

impl RedisOwnerNotifier {
    pub const fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl OwnerNotifier for RedisOwnerNotifier {
    async fn notify(&self, owner_id: &str, event: &HubEvent) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.connection.clone();
        let receivers: i64 = conn
            .publish(owner_channel(owner_id), payload)
            .await
            .map_err(|e| NotifyError::Backend(e.to_string()))?;
        debug!(owner_id, hub_id = event.hub_id(), receivers, "Published owner event");
        Ok(())
    }
}
