//! Instance metadata and liveness.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;

/// Build commit, injected by CI through `HUBWIRE_COMMIT`.
pub const COMMIT: &str = match option_env!("HUBWIRE_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInfo {
    pub name: String,
    pub version: String,
    pub commit: String,
    pub current_time: DateTime<Utc>,
    pub fqdn: String,
    pub country_code: String,
}

/// `GET /`
pub async fn instance_info(State(state): State<AppState>) -> Json<InstanceInfo> {
    Json(InstanceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: COMMIT.to_string(),
        current_time: Utc::now(),
        fqdn: state.fqdn.to_string(),
        country_code: state.country_code.to_string(),
    })
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}
