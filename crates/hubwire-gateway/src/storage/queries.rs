//! Hub, shocker and share queries.

use hubwire_core::SharePermissions;
use hubwire_core::db::unix_timestamp;

use super::db::{DatabaseError, GatewayDatabase};
use super::models::{Hub, Shocker, ShockerShare};
use crate::hub::ShockerModel;

/// Parameters for [`GatewayDatabase::create_share`].
#[derive(Debug, Clone)]
pub struct ShareParams<'a> {
    pub shocker_id: &'a str,
    pub user_id: &'a str,
    pub permissions: SharePermissions,
    pub limit_intensity: Option<u8>,
    pub paused: bool,
    pub expires_at: Option<i64>,
}

impl GatewayDatabase {
    // =========================================================================
    // Hubs
    // =========================================================================

    /// Provision a hub. The raw device token is never stored.
    pub async fn create_hub(
        &self,
        id: &str,
        owner_id: &str,
        name: &str,
        token_hash: &str,
    ) -> Result<Hub, DatabaseError> {
        sqlx::query(
            "INSERT INTO hubs (id, owner_id, name, token_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(token_hash)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        self.get_hub(id).await
    }

    pub async fn get_hub(&self, id: &str) -> Result<Hub, DatabaseError> {
        sqlx::query_as::<_, Hub>("SELECT * FROM hubs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Hub {id}")))
    }

    /// Resolve the hub a device token belongs to.
    pub async fn find_hub_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Hub>, DatabaseError> {
        let hub = sqlx::query_as::<_, Hub>("SELECT * FROM hubs WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(self.pool())
            .await?;
        Ok(hub)
    }

    // =========================================================================
    // Shockers
    // =========================================================================

    pub async fn create_shocker(
        &self,
        id: &str,
        hub_id: &str,
        name: &str,
        rf_id: u16,
        model: ShockerModel,
    ) -> Result<Shocker, DatabaseError> {
        sqlx::query(
            "INSERT INTO shockers (id, hub_id, name, rf_id, model, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(hub_id)
        .bind(name)
        .bind(i64::from(rf_id))
        .bind(model.as_str())
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        sqlx::query_as::<_, Shocker>("SELECT * FROM shockers WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(Into::into)
    }

    pub async fn set_shocker_paused(&self, id: &str, paused: bool) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE shockers SET paused = ? WHERE id = ?")
            .bind(paused)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_hub_shockers(&self, hub_id: &str) -> Result<Vec<Shocker>, DatabaseError> {
        let shockers =
            sqlx::query_as::<_, Shocker>("SELECT * FROM shockers WHERE hub_id = ? ORDER BY id")
                .bind(hub_id)
                .fetch_all(self.pool())
                .await?;
        Ok(shockers)
    }

    // =========================================================================
    // Shares
    // =========================================================================

    pub async fn create_share(&self, params: &ShareParams<'_>) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO shocker_shares \
             (shocker_id, user_id, perm_shock, perm_vibrate, perm_sound, perm_live, \
              limit_intensity, paused, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(params.shocker_id)
        .bind(params.user_id)
        .bind(params.permissions.shock)
        .bind(params.permissions.vibrate)
        .bind(params.permissions.sound)
        .bind(params.permissions.live)
        .bind(params.limit_intensity.map(i64::from))
        .bind(params.paused)
        .bind(params.expires_at)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Non-expired shares `user_id` holds on shockers attached to `hub_id`.
    pub async fn list_active_shares(
        &self,
        user_id: &str,
        hub_id: &str,
    ) -> Result<Vec<ShockerShare>, DatabaseError> {
        let shares = sqlx::query_as::<_, ShockerShare>(
            "SELECT ss.* FROM shocker_shares ss \
             JOIN shockers s ON s.id = ss.shocker_id \
             WHERE ss.user_id = ? AND s.hub_id = ? \
               AND (ss.expires_at IS NULL OR ss.expires_at > ?) \
             ORDER BY ss.shocker_id",
        )
        .bind(user_id)
        .bind(hub_id)
        .bind(unix_timestamp())
        .fetch_all(self.pool())
        .await?;
        Ok(shares)
    }

    /// Whether `user_id` owns `hub_id` or holds an active share on it.
    pub async fn has_hub_access(&self, user_id: &str, hub_id: &str) -> Result<bool, DatabaseError> {
        let (allowed,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM hubs WHERE id = ?1 AND owner_id = ?2) \
             OR EXISTS (SELECT 1 FROM shocker_shares ss JOIN shockers s ON s.id = ss.shocker_id \
                        WHERE s.hub_id = ?1 AND ss.user_id = ?2 \
                          AND (ss.expires_at IS NULL OR ss.expires_at > ?3))",
        )
        .bind(hub_id)
        .bind(user_id)
        .bind(unix_timestamp())
        .fetch_one(self.pool())
        .await?;
        Ok(allowed)
    }
}
