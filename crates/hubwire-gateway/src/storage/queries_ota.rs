//! OTA run queries.

use hubwire_core::db::unix_timestamp;

use super::db::{DatabaseError, GatewayDatabase};
use super::models::OtaUpdate;

impl GatewayDatabase {
    /// Record a started run, restarting it if the hub reuses an update ID.
    pub async fn upsert_ota_started(
        &self,
        hub_id: &str,
        update_id: i32,
        version: &str,
    ) -> Result<(), DatabaseError> {
        let now = unix_timestamp();
        sqlx::query(
            "INSERT INTO ota_updates (hub_id, update_id, version, status, message, started_at, updated_at) \
             VALUES (?, ?, ?, 'started', NULL, ?, ?) \
             ON CONFLICT (hub_id, update_id) DO UPDATE SET \
               version = excluded.version, status = 'started', message = NULL, \
               started_at = excluded.started_at, updated_at = excluded.updated_at",
        )
        .bind(hub_id)
        .bind(update_id)
        .bind(version)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Move a run to `status` if it is currently `started` or `running`.
    ///
    /// Returns `false` when no such open run exists.
    pub async fn transition_open_ota(
        &self,
        hub_id: &str,
        update_id: i32,
        status: &str,
        message: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE ota_updates SET status = ?, message = COALESCE(?, message), updated_at = ? \
             WHERE hub_id = ? AND update_id = ? AND status IN ('started', 'running')",
        )
        .bind(status)
        .bind(message)
        .bind(unix_timestamp())
        .bind(hub_id)
        .bind(update_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_ota_update(
        &self,
        hub_id: &str,
        update_id: i32,
    ) -> Result<Option<OtaUpdate>, DatabaseError> {
        let run = sqlx::query_as::<_, OtaUpdate>(
            "SELECT * FROM ota_updates WHERE hub_id = ? AND update_id = ?",
        )
        .bind(hub_id)
        .bind(update_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(run)
    }
}
