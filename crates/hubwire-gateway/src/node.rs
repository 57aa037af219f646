//! Gateway node announcements and nearest-gateway selection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hubwire_core::region;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lifetime::HubLifetimeManager;
use crate::presence::PresenceError;

pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(10);
/// Announcements outlive a couple of missed refreshes.
pub const ANNOUNCE_TTL: Duration = Duration::from_secs(30);

const NODE_SET_KEY: &str = "hubwire:gateways";
const NODE_KEY_PREFIX: &str = "hubwire:gateway";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNode {
    pub fqdn: String,
    pub country_code: String,
    pub version: String,
    pub connected_hubs: u32,
}

#[async_trait]
pub trait NodeRegistry: Send + Sync {
    async fn announce(&self, node: &GatewayNode, ttl: Duration) -> Result<(), PresenceError>;

    /// Every node whose announcement has not expired.
    async fn list(&self) -> Result<Vec<GatewayNode>, PresenceError>;
}

// =========================================================================
// In-process registry
// =========================================================================

#[derive(Default)]
pub struct InMemoryNodeRegistry {
    nodes: Mutex<HashMap<String, (GatewayNode, Instant)>>,
}

impl InMemoryNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeRegistry for InMemoryNodeRegistry {
    async fn announce(&self, node: &GatewayNode, ttl: Duration) -> Result<(), PresenceError> {
        self.nodes
            .lock()
            .await
            .insert(node.fqdn.clone(), (node.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<GatewayNode>, PresenceError> {
        let now = Instant::now();
        let mut nodes = self.nodes.lock().await;
        nodes.retain(|_, (_, expires)| *expires > now);
        Ok(nodes.values().map(|(n, _)| n.clone()).collect())
    }
}

// =========================================================================
// Redis registry
// =========================================================================

/// Node records live under TTL keys; a set indexes the known FQDNs.
#[derive(Clone)]
pub struct RedisNodeRegistry {
    connection: ConnectionManager,
}

impl RedisNodeRegistry {
    pub const fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    fn key(fqdn: &str) -> String {
        format!("{NODE_KEY_PREFIX}:{fqdn}")
    }
}

#[async_trait]
impl NodeRegistry for RedisNodeRegistry {
    async fn announce(&self, node: &GatewayNode, ttl: Duration) -> Result<(), PresenceError> {
        let payload = serde_json::to_string(node)?;
        let mut conn = self.connection.clone();
        let () = conn
            .set_ex(Self::key(&node.fqdn), payload, ttl.as_secs().max(1))
            .await?;
        let _added: i64 = conn.sadd(NODE_SET_KEY, &node.fqdn).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<GatewayNode>, PresenceError> {
        let mut conn = self.connection.clone();
        let fqdns: Vec<String> = conn.smembers(NODE_SET_KEY).await?;
        if fqdns.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = fqdns.iter().map(|f| Self::key(f)).collect();
        let payloads: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut nodes = Vec::with_capacity(fqdns.len());
        for (fqdn, payload) in fqdns.iter().zip(payloads) {
            match payload {
                Some(p) => match serde_json::from_str::<GatewayNode>(&p) {
                    Ok(node) => nodes.push(node),
                    Err(e) => warn!(fqdn = %fqdn, error = %e, "Malformed gateway announcement"),
                },
                None => {
                    // Announcement expired; drop the index entry.
                    let _removed: i64 = conn.srem(NODE_SET_KEY, fqdn).await?;
                }
            }
        }
        Ok(nodes)
    }
}

// =========================================================================
// Selection
// =========================================================================

/// Pick the node closest to `country_code`. Ties go to the node with fewer
/// connected hubs, then to the lexicographically smaller FQDN.
pub fn select_nearest<'a>(nodes: &'a [GatewayNode], country_code: &str) -> Option<&'a GatewayNode> {
    nodes
        .iter()
        .map(|node| {
            let distance = region::distance_between(country_code, &node.country_code);
            (distance, node)
        })
        .min_by(|(da, a), (db, b)| {
            da.total_cmp(db)
                .then_with(|| a.connected_hubs.cmp(&b.connected_hubs))
                .then_with(|| a.fqdn.cmp(&b.fqdn))
        })
        .map(|(_, node)| node)
}

/// Announce this gateway every [`ANNOUNCE_INTERVAL`] until cancelled.
pub async fn run_announcer(
    registry: Arc<dyn NodeRegistry>,
    lifetime: HubLifetimeManager,
    fqdn: String,
    country_code: String,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(ANNOUNCE_INTERVAL);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let node = GatewayNode {
                    fqdn: fqdn.clone(),
                    country_code: country_code.clone(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    connected_hubs: u32::try_from(lifetime.connection_count()).unwrap_or(u32::MAX),
                };
                match registry.announce(&node, ANNOUNCE_TTL).await {
                    Ok(()) => debug!(hubs = node.connected_hubs, "Gateway announced"),
                    Err(e) => warn!(error = %e, "Failed to announce gateway"),
                }
            }
        }
    }
}
