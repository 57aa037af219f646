//! Owner notifications for hub status and OTA progress.

mod local;
mod redis_publisher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use local::{LocalOwnerNotifier, OwnerEvent};
pub use redis_publisher::RedisOwnerNotifier;

/// Event delivered to the owner of a hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HubEvent {
    HubStatus {
        hub_id: String,
        online: bool,
        firmware_version: Option<semver::Version>,
    },
    OtaStarted {
        hub_id: String,
        update_id: i32,
        version: Option<semver::Version>,
    },
    OtaProgress {
        hub_id: String,
        update_id: i32,
        task: String,
        progress: f32,
    },
    OtaFailed {
        hub_id: String,
        update_id: i32,
        fatal: bool,
        message: String,
    },
    OtaSucceeded {
        hub_id: String,
        update_id: i32,
        version: Option<semver::Version>,
    },
    OtaRollback {
        hub_id: String,
        update_id: i32,
        message: String,
    },
}

impl HubEvent {
    pub fn hub_id(&self) -> &str {
        match self {
            Self::HubStatus { hub_id, .. }
            | Self::OtaStarted { hub_id, .. }
            | Self::OtaProgress { hub_id, .. }
            | Self::OtaFailed { hub_id, .. }
            | Self::OtaSucceeded { hub_id, .. }
            | Self::OtaRollback { hub_id, .. } => hub_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification backend error: {0}")]
    Backend(String),

    #[error("Failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait OwnerNotifier: Send + Sync {
    async fn notify(&self, owner_id: &str, event: &HubEvent) -> Result<(), NotifyError>;
}

/// Pub/sub channel carrying one owner's events.
pub fn owner_channel(owner_id: &str) -> String {
    format!("hubwire:owner-events:{owner_id}")
}
