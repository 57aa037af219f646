//! Hub device-token authentication.

use sha2::{Digest, Sha256};

use super::AuthError;
use crate::hub::HubIdentity;
use crate::storage::GatewayDatabase;

pub const DEVICE_TOKEN_HEADER: &str = "Device-Token";

/// Hash a device token for storage (raw tokens are never stored).
pub fn hash_device_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve the hub a raw device token belongs to.
pub async fn authenticate_hub(
    db: &GatewayDatabase,
    token: &str,
) -> Result<HubIdentity, AuthError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    let hub = db
        .find_hub_by_token_hash(&hash_device_token(token))
        .await?
        .ok_or(AuthError::UnknownDevice)?;
    Ok(HubIdentity {
        hub_id: hub.id,
        owner_id: hub.owner_id,
    })
}
