//! Row types for gateway storage.

use hubwire_core::SharePermissions;
use serde::{Deserialize, Serialize};

use crate::hub::ShockerModel;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Hub {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub token_hash: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shocker {
    pub id: String,
    pub hub_id: String,
    pub name: String,
    pub rf_id: i64,
    pub model: String,
    pub paused: bool,
    pub created_at: i64,
}

impl Shocker {
    /// Stored model, `None` for values this build does not know.
    pub fn model(&self) -> Option<ShockerModel> {
        ShockerModel::parse(&self.model)
    }

    pub fn rf_id(&self) -> Option<u16> {
        u16::try_from(self.rf_id).ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShockerShare {
    pub shocker_id: String,
    pub user_id: String,
    pub perm_shock: bool,
    pub perm_vibrate: bool,
    pub perm_sound: bool,
    pub perm_live: bool,
    pub limit_intensity: Option<i64>,
    pub paused: bool,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

impl ShockerShare {
    pub const fn permissions(&self) -> SharePermissions {
        SharePermissions {
            shock: self.perm_shock,
            vibrate: self.perm_vibrate,
            sound: self.perm_sound,
            live: self.perm_live,
        }
    }

    /// Intensity cap in `0..=100`, `None` when unlimited.
    pub fn intensity_limit(&self) -> Option<u8> {
        self.limit_intensity
            .map(|l| u8::try_from(l.clamp(0, 100)).unwrap_or(100))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OtaUpdate {
    pub hub_id: String,
    pub update_id: i64,
    pub version: String,
    pub status: String,
    pub message: Option<String>,
    pub started_at: i64,
    pub updated_at: i64,
}
