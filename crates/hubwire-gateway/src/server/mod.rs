//! HTTP and WebSocket surface of the gateway.

pub mod error;
mod gateways;
mod hub_ws;
mod live_ws;
pub mod meta;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::auth::JwtManager;
use crate::hub::HubServices;
use crate::lifetime::HubLifetimeManager;
use crate::live::LiveGroups;
use crate::node::NodeRegistry;
use crate::storage::GatewayDatabase;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: GatewayDatabase,
    pub jwt: JwtManager,
    pub lifetime: HubLifetimeManager,
    pub hub_services: Arc<HubServices>,
    pub live_groups: LiveGroups,
    pub nodes: Arc<dyn NodeRegistry>,
    /// Root token; every connection runs on a child of it.
    pub shutdown: CancellationToken,
    /// Upgraded sockets, which `axum::serve` does not wait for.
    pub connections: TaskTracker,
    pub fqdn: Arc<str>,
    pub country_code: Arc<str>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(meta::instance_info))
        .route("/healthz", get(meta::healthz))
        .route("/1/ws/hub", get(hub_ws::connect_v1))
        .route("/2/ws/hub", get(hub_ws::connect_v2))
        .route("/1/ws/live/{hub_id}", get(live_ws::connect))
        .route("/1/gateways/nearest", get(gateways::nearest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Stop accepting tracked connections and wait for the running ones to
/// finish their close path. Returns `false` if `limit` elapsed first.
pub async fn drain_connections(connections: &TaskTracker, limit: Duration) -> bool {
    connections.close();
    tokio::time::timeout(limit, connections.wait()).await.is_ok()
}
