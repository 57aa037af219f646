//! Shared-state backends: Redis for a cluster, in-process for one node.

use std::sync::Arc;

use hubwire_core::Config;
use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::auth::JwtManager;
use crate::hub::{HubServices, OtaDispatcher};
use crate::lifetime::HubLifetimeManager;
use crate::live::LiveGroups;
use crate::node::{InMemoryNodeRegistry, NodeRegistry, RedisNodeRegistry};
use crate::notifications::{LocalOwnerNotifier, OwnerNotifier, RedisOwnerNotifier};
use crate::ota::SqliteOtaTracker;
use crate::presence::{InMemoryPresenceStore, PresenceStore, RedisPresenceStore};
use crate::server::AppState;
use crate::storage::GatewayDatabase;

/// Lifetime of access tokens issued by [`JwtManager::issue_access_token`].
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Clone)]
pub struct Backends {
    pub presence: Arc<dyn PresenceStore>,
    pub notifier: Arc<dyn OwnerNotifier>,
    pub nodes: Arc<dyn NodeRegistry>,
}

impl Backends {
    pub fn in_process() -> Self {
        Self {
            presence: Arc::new(InMemoryPresenceStore::new()),
            notifier: Arc::new(LocalOwnerNotifier::default()),
            nodes: Arc::new(InMemoryNodeRegistry::new()),
        }
    }

    pub fn redis(connection: &ConnectionManager) -> Self {
        Self {
            presence: Arc::new(RedisPresenceStore::new(connection.clone())),
            notifier: Arc::new(RedisOwnerNotifier::new(connection.clone())),
            nodes: Arc::new(RedisNodeRegistry::new(connection.clone())),
        }
    }
}

/// Wire configuration, storage and backends into the router state.
pub fn build_state(
    config: &Config,
    db: GatewayDatabase,
    backends: Backends,
    shutdown: CancellationToken,
) -> AppState {
    let timing = config.timing.clone();
    let ota = OtaDispatcher::new(
        Arc::new(SqliteOtaTracker::new(db.clone())),
        Arc::clone(&backends.notifier),
    );
    let hub_services = Arc::new(HubServices {
        presence: backends.presence,
        notifier: backends.notifier,
        ota,
        gateway_fqdn: config.gateway.fqdn.clone(),
        timing: timing.clone(),
    });
    info!(
        fqdn = %config.gateway.fqdn,
        country = %config.gateway.country_code,
        "Gateway state ready"
    );

    AppState {
        db,
        jwt: JwtManager::new(config.gateway.jwt_secret.as_bytes(), ACCESS_TOKEN_TTL_SECS),
        lifetime: HubLifetimeManager::new(timing.acquire_attempts, timing.acquire_backoff()),
        hub_services,
        live_groups: LiveGroups::new(),
        nodes: backends.nodes,
        shutdown,
        connections: TaskTracker::new(),
        fqdn: Arc::from(config.gateway.fqdn.as_str()),
        country_code: Arc::from(config.gateway.country_code.as_str()),
    }
}
