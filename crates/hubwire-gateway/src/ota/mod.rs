//! OTA run tracking.
//!
//! Runs move `Started -> Running -> {Finished | Error}` and are keyed by
//! (hub ID, update ID). Transitions only ever apply to runs that are still
//! open; reports about unknown or closed runs change nothing.

mod sqlite;

use async_trait::async_trait;

pub use sqlite::SqliteOtaTracker;

use crate::storage::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtaStatus {
    Started,
    Running,
    Finished,
    Error,
}

impl OtaStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "started" => Some(Self::Started),
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OtaError {
    #[error("OTA storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Unknown OTA status '{0}' in storage")]
    UnknownStatus(String),
}

#[async_trait]
pub trait OtaTracker: Send + Sync {
    async fn started(
        &self,
        hub_id: &str,
        update_id: i32,
        version: Option<&semver::Version>,
    ) -> Result<(), OtaError>;

    /// Returns `false` if no open run matched.
    async fn progress(&self, hub_id: &str, update_id: i32) -> Result<bool, OtaError>;

    async fn finished(&self, hub_id: &str, update_id: i32) -> Result<bool, OtaError>;

    async fn failed(&self, hub_id: &str, update_id: i32, message: &str) -> Result<bool, OtaError>;

    async fn status(&self, hub_id: &str, update_id: i32) -> Result<Option<OtaStatus>, OtaError>;

    /// Whether the run exists and has not reached a final state.
    async fn is_unfinished(&self, hub_id: &str, update_id: i32) -> Result<bool, OtaError> {
        Ok(self
            .status(hub_id, update_id)
            .await?
            .is_some_and(OtaStatus::is_open))
    }
}
