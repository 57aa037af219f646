//! Who may drive which shocker during a live session.

use std::collections::HashMap;

use hubwire_core::{ControlType, SharePermissions, is_allowed};
use tracing::warn;

use super::messages::{LiveFrame, LiveResponse};
use crate::hub::{ControlCommand, MAX_INTENSITY};
use crate::storage::{DatabaseError, GatewayDatabase, Shocker, ShockerShare};

/// Live frames are short pulses; clients stream them continuously.
pub const LIVE_FRAME_DURATION_MS: u16 = 300;

#[derive(Debug, Clone)]
struct ShockerAccess {
    shocker: Shocker,
    /// `None` for the hub owner.
    share: Option<ShockerShare>,
}

/// Snapshot of a user's rights on one hub, taken when the session opens.
#[derive(Debug, Clone)]
pub struct LiveScope {
    hub_id: String,
    user_id: String,
    is_owner: bool,
    shockers: HashMap<String, ShockerAccess>,
}

impl LiveScope {
    /// Load the scope, or `None` if the user neither owns the hub nor holds
    /// an active share on one of its shockers.
    pub async fn authorize(
        db: &GatewayDatabase,
        user_id: &str,
        hub_id: &str,
    ) -> Result<Option<Self>, DatabaseError> {
        if !db.has_hub_access(user_id, hub_id).await? {
            return Ok(None);
        }
        let hub = match db.get_hub(hub_id).await {
            Ok(hub) => hub,
            Err(DatabaseError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let shockers = db.list_hub_shockers(hub_id).await?;

        let is_owner = hub.owner_id == user_id;
        let accessible: HashMap<String, ShockerAccess> = if is_owner {
            shockers
                .into_iter()
                .map(|s| (s.id.clone(), ShockerAccess { shocker: s, share: None }))
                .collect()
        } else {
            let mut shares: HashMap<String, ShockerShare> = db
                .list_active_shares(user_id, hub_id)
                .await?
                .into_iter()
                .map(|s| (s.shocker_id.clone(), s))
                .collect();
            shockers
                .into_iter()
                .filter_map(|s| {
                    let share = shares.remove(&s.id)?;
                    Some((s.id.clone(), ShockerAccess { shocker: s, share: Some(share) }))
                })
                .collect()
        };

        if !is_owner && accessible.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            hub_id: hub.id,
            user_id: user_id.to_string(),
            is_owner,
            shockers: accessible,
        }))
    }

    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub const fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub fn shocker_count(&self) -> usize {
        self.shockers.len()
    }

    /// Translate a frame into the command to send, or the response to
    /// return to the client instead.
    pub fn resolve(&self, frame: &LiveFrame) -> Result<ControlCommand, LiveResponse> {
        let access = self
            .shockers
            .get(&frame.shocker)
            .ok_or(LiveResponse::ShockerNotFound)?;
        let share = access.share.as_ref();

        if access.shocker.paused || share.is_some_and(|s| s.paused) {
            return Err(LiveResponse::ShockerPaused);
        }

        let permissions: Option<SharePermissions> = share.map(ShockerShare::permissions);
        check_permission(frame.control_type, permissions.as_ref())?;

        let (Some(model), Some(rf_id)) = (access.shocker.model(), access.shocker.rf_id()) else {
            warn!(shocker_id = %access.shocker.id, model = %access.shocker.model, "Shocker has no usable radio settings");
            return Err(LiveResponse::ShockerNotFound);
        };

        let limit = share
            .and_then(ShockerShare::intensity_limit)
            .unwrap_or(MAX_INTENSITY);
        Ok(ControlCommand {
            model,
            rf_id,
            control_type: frame.control_type,
            intensity: frame.intensity.min(limit).min(MAX_INTENSITY),
            duration_ms: LIVE_FRAME_DURATION_MS,
        })
    }
}

fn check_permission(
    control: ControlType,
    permissions: Option<&SharePermissions>,
) -> Result<(), LiveResponse> {
    if !is_allowed(control, false, permissions) {
        return Err(LiveResponse::ShockerMissingPermission);
    }
    if !is_allowed(control, true, permissions) {
        return Err(LiveResponse::ShockerMissingLivePermission);
    }
    Ok(())
}
