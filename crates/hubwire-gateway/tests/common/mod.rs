//! Shared harness: hub actors and live sessions over in-memory channels.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::channel::mpsc;
use hubwire_core::config::TimingConfig;
use hubwire_proto::{
    BootStatus, BootType, HubMessage, KeepAlive, OtaUpdateStarted, Pong, SemVer,
    decode_gateway_message, encode, gateway_message, hub_message,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use hubwire_gateway::auth::hash_device_token;
use hubwire_gateway::hub::{
    CloseReason, HubActor, HubHandle, HubIdentity, HubServices, OtaDispatcher, ProtocolVariant,
    ShockerModel,
};
use hubwire_gateway::lifetime::{AcquireOutcome, HubLifetimeManager};
use hubwire_gateway::notifications::{LocalOwnerNotifier, OwnerNotifier};
use hubwire_gateway::ota::SqliteOtaTracker;
use hubwire_gateway::presence::{
    InMemoryPresenceStore, PresenceError, PresenceRecord, PresenceStore,
};
use hubwire_gateway::storage::GatewayDatabase;
use hubwire_gateway::transport::{OUTBOUND_QUEUE_DEPTH, WireFrame};

pub const GATEWAY_FQDN: &str = "de1.gateway.test";
pub const HUB_ID: &str = "hub-1";
pub const OWNER_ID: &str = "owner-1";
pub const DEVICE_TOKEN: &str = "device-secret";

pub struct Fixture {
    pub db: GatewayDatabase,
    pub presence: Arc<InMemoryPresenceStore>,
    pub notifier: Arc<LocalOwnerNotifier>,
    pub services: Arc<HubServices>,
    pub lifetime: HubLifetimeManager,
    pub root: CancellationToken,
    /// Every spawned actor, as the server tracks upgraded sockets.
    pub connections: TaskTracker,
}

/// Presence store whose removals take `delay`.
struct SlowRemoval {
    inner: Arc<InMemoryPresenceStore>,
    delay: Duration,
}

#[async_trait]
impl PresenceStore for SlowRemoval {
    async fn get(&self, hub_id: &str) -> Result<Option<PresenceRecord>, PresenceError> {
        self.inner.get(hub_id).await
    }

    async fn upsert(&self, record: &PresenceRecord, ttl: Duration) -> Result<(), PresenceError> {
        self.inner.upsert(record, ttl).await
    }

    async fn refresh(&self, hub_id: &str, ttl: Duration) -> Result<bool, PresenceError> {
        self.inner.refresh(hub_id, ttl).await
    }

    async fn remove(&self, hub_id: &str, gateway: &str) -> Result<bool, PresenceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove(hub_id, gateway).await
    }
}

impl Fixture {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Fixture whose presence removals are slow to complete.
    pub async fn with_slow_presence_removal(delay: Duration) -> Self {
        Self::build(Some(delay)).await
    }

    async fn build(removal_delay: Option<Duration>) -> Self {
        let db = GatewayDatabase::open_in_memory().await.unwrap();
        db.create_hub(HUB_ID, OWNER_ID, "Test hub", &hash_device_token(DEVICE_TOKEN))
            .await
            .unwrap();
        db.create_shocker("s-1", HUB_ID, "Collar", 4242, ShockerModel::CaiXianlin)
            .await
            .unwrap();

        let presence = Arc::new(InMemoryPresenceStore::new());
        let store: Arc<dyn PresenceStore> = match removal_delay {
            Some(delay) => Arc::new(SlowRemoval {
                inner: Arc::clone(&presence),
                delay,
            }),
            None => Arc::clone(&presence) as Arc<dyn PresenceStore>,
        };
        let notifier = Arc::new(LocalOwnerNotifier::default());
        let timing = TimingConfig::default();
        let services = Arc::new(HubServices {
            presence: store,
            notifier: Arc::clone(&notifier) as Arc<dyn OwnerNotifier>,
            ota: OtaDispatcher::new(
                Arc::new(SqliteOtaTracker::new(db.clone())),
                Arc::clone(&notifier) as Arc<dyn OwnerNotifier>,
            ),
            gateway_fqdn: GATEWAY_FQDN.to_string(),
            timing: timing.clone(),
        });
        Self {
            db,
            presence,
            notifier,
            services,
            lifetime: HubLifetimeManager::new(timing.acquire_attempts, timing.acquire_backoff()),
            root: CancellationToken::new(),
            connections: TaskTracker::new(),
        }
    }

    pub async fn presence(&self) -> Option<PresenceRecord> {
        self.presence.get(HUB_ID).await.unwrap()
    }

    /// Poll until the presence record satisfies `f`.
    pub async fn wait_for_presence(
        &self,
        f: impl Fn(&PresenceRecord) -> bool,
    ) -> PresenceRecord {
        for _ in 0..200 {
            if let Some(record) = self.presence().await
                && f(&record)
            {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("presence never reached the expected state");
    }

    /// Acquire a slot and start an actor, as the hub handshake does.
    pub async fn connect_hub(&self, protocol: ProtocolVariant, firmware: &str) -> HubConn {
        self.try_connect_hub(protocol, firmware)
            .await
            .unwrap_or_else(|| panic!("slot for {HUB_ID} was busy"))
    }

    pub async fn try_connect_hub(
        &self,
        protocol: ProtocolVariant,
        firmware: &str,
    ) -> Option<HubConn> {
        let (handle, mailbox) = HubHandle::new(
            HubIdentity {
                hub_id: HUB_ID.into(),
                owner_id: OWNER_ID.into(),
            },
            semver::Version::parse(firmware).unwrap(),
            protocol,
            &self.root,
            OUTBOUND_QUEUE_DEPTH,
        );
        let AcquireOutcome::Acquired(lease) =
            self.lifetime.try_acquire(handle.clone()).await.unwrap()
        else {
            return None;
        };

        let (sink, to_hub) = mpsc::channel::<WireFrame>(OUTBOUND_QUEUE_DEPTH);
        let (from_hub, inbound) = mpsc::channel::<Result<WireFrame, String>>(16);
        let actor = HubActor::new(handle.clone(), mailbox, lease, Arc::clone(&self.services));
        let task = self.connections.spawn(actor.run(sink, inbound));
        Some(HubConn {
            handle,
            to_hub,
            from_hub,
            task,
        })
    }
}

pub struct HubConn {
    pub handle: HubHandle,
    /// Frames the gateway wrote to the hub.
    pub to_hub: mpsc::Receiver<WireFrame>,
    from_hub: mpsc::Sender<Result<WireFrame, String>>,
    pub task: JoinHandle<CloseReason>,
}

impl HubConn {
    pub fn send(&mut self, payload: hub_message::Payload) {
        let frame = encode(&HubMessage::from(payload));
        self.from_hub.try_send(Ok(WireFrame::Binary(frame))).unwrap();
    }

    pub fn keep_alive(&mut self, booted_at: DateTime<Utc>) {
        self.send(hub_message::Payload::KeepAlive(KeepAlive {
            uptime_ms: uptime_since(booted_at),
        }));
    }

    pub fn pong(&mut self, booted_at: DateTime<Utc>, rssi: i32) {
        self.send(hub_message::Payload::Pong(Pong {
            uptime_ms: uptime_since(booted_at),
            rssi,
        }));
    }

    pub fn ota_started(&mut self, update_id: i32, version: SemVer) {
        self.send(hub_message::Payload::OtaUpdateStarted(OtaUpdateStarted {
            update_id,
            version: Some(version),
        }));
    }

    pub fn boot_status(&mut self, boot_type: BootType, update_id: i32) {
        self.send(hub_message::Payload::BootStatus(BootStatus {
            boot_type: boot_type.into(),
            ota_update_id: update_id,
            firmware_version: None,
        }));
    }

    /// Next frame the gateway wrote.
    pub async fn next_frame(&mut self) -> Option<WireFrame> {
        tokio::time::timeout(Duration::from_secs(120), self.to_hub.next())
            .await
            .ok()
            .flatten()
    }

    pub async fn next_payload(&mut self) -> gateway_message::Payload {
        match self.next_frame().await {
            Some(WireFrame::Binary(bytes)) => decode_gateway_message(&bytes).unwrap(),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }

    /// Close from the hub side and wait for the actor.
    pub async fn hang_up(self) -> CloseReason {
        drop(self.from_hub);
        self.task.await.unwrap()
    }
}

pub fn uptime_since(booted_at: DateTime<Utc>) -> u64 {
    u64::try_from((Utc::now() - booted_at).num_milliseconds()).unwrap()
}

pub fn semver(major: u32, minor: u32, patch: u32) -> SemVer {
    SemVer {
        major,
        minor,
        patch,
        prerelease: String::new(),
        build: String::new(),
    }
}
