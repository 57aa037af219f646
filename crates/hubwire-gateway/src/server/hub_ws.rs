//! Hub WebSocket handshake.
//!
//! Every refusal happens before the upgrade: the firmware header, the device
//! token and the lifetime slot are all checked while the request is still
//! plain HTTP.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use hubwire_core::firmware::{FIRMWARE_VERSION_HEADER, parse_firmware_version};
use tracing::{debug, info};

use super::error::ApiError;
use super::{AppState, ws};
use crate::auth::{DEVICE_TOKEN_HEADER, authenticate_hub};
use crate::hub::{HubActor, HubHandle, ProtocolVariant};
use crate::lifetime::AcquireOutcome;
use crate::transport::OUTBOUND_QUEUE_DEPTH;

/// `GET /1/ws/hub`
pub async fn connect_v1(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    connect(state, ProtocolVariant::V1, &headers, upgrade)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// `GET /2/ws/hub`
pub async fn connect_v2(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    connect(state, ProtocolVariant::V2, &headers, upgrade)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn connect(
    state: AppState,
    protocol: ProtocolVariant,
    headers: &HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let raw_version = header(headers, FIRMWARE_VERSION_HEADER).ok_or_else(|| {
        ApiError::BadRequest(format!("Missing {FIRMWARE_VERSION_HEADER} header"))
    })?;
    let firmware =
        parse_firmware_version(raw_version).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let token = header(headers, DEVICE_TOKEN_HEADER).unwrap_or_default();
    let identity = authenticate_hub(&state.db, token).await?;

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            debug!(hub_id = %identity.hub_id, "Hub request is not a WebSocket upgrade");
            return Ok(rejection.into_response());
        }
    };

    let (handle, mailbox) = HubHandle::new(
        identity,
        firmware,
        protocol,
        &state.shutdown,
        OUTBOUND_QUEUE_DEPTH,
    );
    let lease = match state.lifetime.try_acquire(handle.clone()).await? {
        AcquireOutcome::Acquired(lease) => lease,
        AcquireOutcome::Busy => return Err(ApiError::Busy),
    };
    info!(hub_id = %handle.hub_id(), protocol = protocol.as_str(), "Hub handshake accepted");

    let actor = HubActor::new(handle, mailbox, lease, Arc::clone(&state.hub_services));
    let connections = state.connections.clone();
    Ok(upgrade.on_upgrade(move |socket| {
        connections.track_future(async move {
            let (sink, stream) = ws::split(socket);
            actor.run(sink, stream).await;
        })
    }))
}
