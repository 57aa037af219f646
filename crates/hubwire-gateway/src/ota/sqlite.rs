//! OTA tracker backed by the gateway database.

use async_trait::async_trait;

use super::{OtaError, OtaStatus, OtaTracker};
use crate::storage::GatewayDatabase;

#[derive(Clone)]
pub struct SqliteOtaTracker {
    db: GatewayDatabase,
}

impl SqliteOtaTracker {
    pub const fn new(db: GatewayDatabase) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtaTracker for SqliteOtaTracker {
    async fn started(
        &self,
        hub_id: &str,
        update_id: i32,
        version: Option<&semver::Version>,
    ) -> Result<(), OtaError> {
        let version = version.map_or_else(String::new, ToString::to_string);
        self.db
            .upsert_ota_started(hub_id, update_id, &version)
            .await?;
        Ok(())
    }

    async fn progress(&self, hub_id: &str, update_id: i32) -> Result<bool, OtaError> {
        Ok(self
            .db
            .transition_open_ota(hub_id, update_id, OtaStatus::Running.as_str(), None)
            .await?)
    }

    async fn finished(&self, hub_id: &str, update_id: i32) -> Result<bool, OtaError> {
        Ok(self
            .db
            .transition_open_ota(hub_id, update_id, OtaStatus::Finished.as_str(), None)
            .await?)
    }

    async fn failed(&self, hub_id: &str, update_id: i32, message: &str) -> Result<bool, OtaError> {
        Ok(self
            .db
            .transition_open_ota(hub_id, update_id, OtaStatus::Error.as_str(), Some(message))
            .await?)
    }

    async fn status(&self, hub_id: &str, update_id: i32) -> Result<Option<OtaStatus>, OtaError> {
        match self.db.get_ota_update(hub_id, update_id).await? {
            None => Ok(None),
            Some(run) => OtaStatus::parse(&run.status)
                .map(Some)
                .ok_or(OtaError::UnknownStatus(run.status)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn tracker() -> SqliteOtaTracker {
        let db = GatewayDatabase::open_in_memory().await.unwrap();
        db.create_hub("hub-1", "owner-1", "Desk", "hash").await.unwrap();
        SqliteOtaTracker::new(db)
    }

    #[tokio::test]
    async fn run_progresses_to_finished() {
        let ota = tracker().await;
        ota.started("hub-1", 3, Some(&semver::Version::new(1, 3, 0)))
            .await
            .unwrap();
        assert_eq!(ota.status("hub-1", 3).await.unwrap(), Some(OtaStatus::Started));
        assert!(ota.progress("hub-1", 3).await.unwrap());
        assert!(ota.progress("hub-1", 3).await.unwrap());
        assert!(ota.is_unfinished("hub-1", 3).await.unwrap());
        assert!(ota.finished("hub-1", 3).await.unwrap());
        assert_eq!(ota.status("hub-1", 3).await.unwrap(), Some(OtaStatus::Finished));
        assert!(!ota.is_unfinished("hub-1", 3).await.unwrap());
    }

    #[tokio::test]
    async fn closed_runs_are_not_reopened() {
        let ota = tracker().await;
        ota.started("hub-1", 4, None).await.unwrap();
        assert!(ota.failed("hub-1", 4, "flash failed").await.unwrap());
        assert!(!ota.progress("hub-1", 4).await.unwrap());
        assert!(!ota.finished("hub-1", 4).await.unwrap());
        assert_eq!(ota.status("hub-1", 4).await.unwrap(), Some(OtaStatus::Error));
    }

    #[tokio::test]
    async fn unknown_runs_are_untouched() {
        let ota = tracker().await;
        assert!(!ota.finished("hub-1", 99).await.unwrap());
        assert_eq!(ota.status("hub-1", 99).await.unwrap(), None);
        assert!(!ota.is_unfinished("hub-1", 99).await.unwrap());
    }
}
