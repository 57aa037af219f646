//! Live control WebSocket handshake.

use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::error::ApiError;
use super::{AppState, ws};
use crate::auth::{AuthError, extract_bearer};
use crate::live::{LiveScope, LiveSession};

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// `GET /1/ws/live/{hub_id}`
pub async fn connect(
    State(state): State<AppState>,
    Path(hub_id): Path<String>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    open(state, &hub_id, query.token.as_deref(), &headers, upgrade)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn open(
    state: AppState,
    hub_id: &str,
    query_token: Option<&str>,
    headers: &HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let token = extract_bearer(authorization, query_token).ok_or(AuthError::MissingToken)?;
    let user_id = state.jwt.authenticate_user(token)?;

    let scope = LiveScope::authorize(&state.db, &user_id, hub_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Hub {hub_id} not found")))?;

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let session = LiveSession::new(
        scope,
        state.lifetime.clone(),
        &state.live_groups,
        state.hub_services.timing.live_ping_interval(),
        state.shutdown.child_token(),
    );
    let connections = state.connections.clone();
    Ok(upgrade.on_upgrade(move |socket| {
        connections.track_future(async move {
            let (sink, stream) = ws::split(socket);
            session.run(sink, stream).await;
        })
    }))
}
