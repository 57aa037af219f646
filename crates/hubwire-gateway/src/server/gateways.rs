//! Nearest-gateway lookup.

use axum::Json;
use axum::extract::{Query, State};
use hubwire_core::region;
use serde::Deserialize;

use super::AppState;
use super::error::ApiError;
use crate::node::{GatewayNode, select_nearest};

#[derive(Debug, Deserialize)]
pub struct NearestQuery {
    pub country: Option<String>,
}

/// `GET /1/gateways/nearest?country=XX`. Without a country the gateway's
/// own country is used.
pub async fn nearest(
    State(state): State<AppState>,
    Query(query): Query<NearestQuery>,
) -> Result<Json<GatewayNode>, ApiError> {
    let country = query
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(&*state.country_code);
    if !region::is_known(country) {
        tracing::debug!(country = %country, "Unknown country, falling back to region sentinel");
    }

    let nodes = state
        .nodes
        .list()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    select_nearest(&nodes, country)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No gateway announced".to_string()))
}
