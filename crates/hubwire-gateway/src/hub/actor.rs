//! Per-connection hub actor.
//!
//! The actor is the only reader of a hub socket and the only writer of that
//! hub's presence record. It processes frames strictly in arrival order and
//! tears everything down exactly once when any cancellation source fires.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{Sink, Stream, StreamExt};
use hubwire_core::config::TimingConfig;
use hubwire_proto::{ProtocolError, decode_hub_message, hub_message};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use super::handle::{HubHandle, HubMailbox, HubState};
use super::ota::{OtaDispatcher, OtaReport, OtaReportError};
use super::protocol::{
    KeepAliveRejection, ProtocolVariant, infer_boot_time, latency_ms, ping_due,
};
use crate::lifetime::SlotLease;
use crate::notifications::{HubEvent, OwnerNotifier};
use crate::presence::{PresenceRecord, PresenceStore};
use crate::transport::{
    CLOSE_NORMAL, CLOSE_PROTOCOL_ERROR, CLOSE_SERVICE_RESTART, WireFrame, spawn_writer,
};

/// Collaborators shared by every hub actor on this gateway.
pub struct HubServices {
    pub presence: Arc<dyn PresenceStore>,
    pub notifier: Arc<dyn OwnerNotifier>,
    pub ota: OtaDispatcher,
    /// FQDN written into presence records.
    pub gateway_fqdn: String,
    pub timing: TimingConfig,
}

/// Why a hub connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    KeepAliveTimeout,
    Displaced,
    Shutdown,
    RemoteClosed,
    TransportError,
}

impl CloseReason {
    const fn close_frame(self) -> (u16, &'static str) {
        match self {
            Self::KeepAliveTimeout => (CLOSE_PROTOCOL_ERROR, "keep-alive timeout"),
            Self::Displaced => (CLOSE_NORMAL, "replaced by a newer connection"),
            Self::Shutdown => (CLOSE_SERVICE_RESTART, "gateway shutting down"),
            Self::RemoteClosed | Self::TransportError => (CLOSE_NORMAL, ""),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    #[error("{0} is not valid on protocol {1}")]
    WrongVariant(&'static str, &'static str),

    #[error(transparent)]
    KeepAlive(#[from] KeepAliveRejection),

    #[error(transparent)]
    Ota(#[from] OtaReportError),

    #[error("unexpected text frame")]
    TextFrame,
}

/// Result of handling one inbound frame.
#[derive(Debug, PartialEq, Eq)]
enum FrameOutcome {
    KeepAliveAccepted,
    Handled,
}

pub struct HubActor {
    handle: HubHandle,
    mailbox: HubMailbox,
    lease: SlotLease,
    services: Arc<HubServices>,
}

impl HubActor {
    pub const fn new(
        handle: HubHandle,
        mailbox: HubMailbox,
        lease: SlotLease,
        services: Arc<HubServices>,
    ) -> Self {
        Self {
            handle,
            mailbox,
            lease,
            services,
        }
    }

    /// Drive the connection until it closes.
    #[instrument(
        name = "hub",
        skip_all,
        fields(hub_id = %self.handle.hub_id(), protocol = self.handle.protocol().as_str())
    )]
    pub async fn run<Si, St, E>(self, sink: Si, inbound: St) -> CloseReason
    where
        Si: Sink<WireFrame> + Send + Unpin + 'static,
        Si::Error: Display,
        St: Stream<Item = Result<WireFrame, E>> + Unpin,
        E: Display,
    {
        let Self {
            handle,
            mailbox: HubMailbox { outbound, state },
            lease,
            services,
        } = self;
        let writer = spawn_writer(sink, outbound);
        let mut conn = Connection {
            handle,
            state,
            services,
            connected_at: Utc::now(),
            outstanding_ping: None,
            latency_ms: None,
            rssi: None,
            written: None,
            announced_online: false,
        };
        info!(firmware = %conn.handle.firmware(), "Hub connected");

        let reason = conn.serve(inbound).await;
        conn.shutdown(reason, writer, lease).await;
        reason
    }
}

/// Mutable per-connection state while the actor is running.
struct Connection {
    handle: HubHandle,
    state: tokio::sync::watch::Sender<HubState>,
    services: Arc<HubServices>,
    connected_at: DateTime<Utc>,
    outstanding_ping: Option<DateTime<Utc>>,
    latency_ms: Option<u64>,
    rssi: Option<i32>,
    written: Option<PresenceRecord>,
    announced_online: bool,
}

impl Connection {
    fn timing(&self) -> &TimingConfig {
        &self.services.timing
    }

    fn set_state(&self, next: HubState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                debug!(from = ?*current, to = ?next, "Hub state change");
                *current = next;
                true
            }
        });
    }

    async fn serve<St, E>(&mut self, mut inbound: St) -> CloseReason
    where
        St: Stream<Item = Result<WireFrame, E>> + Unpin,
        E: Display,
    {
        let timeout = self.timing().keepalive_timeout();
        let stale_after = timeout / 2;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let stale = tokio::time::sleep(stale_after);
        tokio::pin!(stale);

        let pings = self.handle.protocol().supports_ping();
        let mut ping_timer = tokio::time::interval(self.timing().hub_ping_interval());
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancel = self.handle.cancellation().clone();

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    return if self.handle.is_displaced() {
                        CloseReason::Displaced
                    } else {
                        CloseReason::Shutdown
                    };
                }
                () = &mut deadline => {
                    warn!(timeout_secs = timeout.as_secs(), "Hub keep-alive timeout");
                    return CloseReason::KeepAliveTimeout;
                }
                () = &mut stale, if self.state.borrow().eq(&HubState::Online) => {
                    self.set_state(HubState::Stale);
                }
                _ = ping_timer.tick(), if pings => self.send_ping(),
                frame = inbound.next() => match frame {
                    None => return CloseReason::RemoteClosed,
                    Some(Err(e)) => {
                        debug!(error = %e, "Hub socket read failed");
                        return CloseReason::TransportError;
                    }
                    Some(Ok(WireFrame::Close { code, .. })) => {
                        debug!(code, "Hub closed the connection");
                        return CloseReason::RemoteClosed;
                    }
                    Some(Ok(frame)) => match self.handle_frame(frame).await {
                        Ok(FrameOutcome::KeepAliveAccepted) => {
                            let now = Instant::now();
                            deadline.as_mut().reset(now + timeout);
                            stale.as_mut().reset(now + stale_after);
                        }
                        Ok(FrameOutcome::Handled) => {}
                        Err(e) => warn!(error = %e, "Dropped hub message"),
                    },
                },
            }
        }
    }

    fn send_ping(&mut self) {
        // An unanswered ping is given up on after two intervals.
        let expiry = self.timing().hub_ping_interval() * 2;
        if !ping_due(self.outstanding_ping, Utc::now(), expiry) {
            debug!("Previous hub ping still outstanding");
            return;
        }
        match self.handle.ping() {
            Ok(sent_at) => self.outstanding_ping = Some(sent_at),
            Err(e) => debug!(error = %e, "Failed to queue hub ping"),
        }
    }

    async fn handle_frame(&mut self, frame: WireFrame) -> Result<FrameOutcome, FrameError> {
        let WireFrame::Binary(bytes) = frame else {
            return Err(FrameError::TextFrame);
        };
        let payload = decode_hub_message(&bytes)?;
        let protocol = self.handle.protocol();

        match (&payload, protocol) {
            (hub_message::Payload::KeepAlive(k), ProtocolVariant::V1) => {
                self.on_keepalive(k.uptime_ms, None).await?;
                return Ok(FrameOutcome::KeepAliveAccepted);
            }
            (hub_message::Payload::Pong(p), ProtocolVariant::V2) => {
                self.on_keepalive(p.uptime_ms, Some(p.rssi)).await?;
                return Ok(FrameOutcome::KeepAliveAccepted);
            }
            (hub_message::Payload::KeepAlive(_), _) => {
                return Err(FrameError::WrongVariant("KeepAlive", protocol.as_str()));
            }
            (hub_message::Payload::Pong(_), _) => {
                return Err(FrameError::WrongVariant("Pong", protocol.as_str()));
            }
            _ => {}
        }

        if let Some(report) = OtaReport::from_payload(&payload)? {
            let ota = self.services.ota.clone();
            let identity = self.handle.identity().clone();
            self.bounded("ota", async move { ota.dispatch(&identity, report).await })
                .await;
        }
        Ok(FrameOutcome::Handled)
    }

    /// Accept a keep-alive (V1) or pong (V2). `rssi` is present for pongs.
    async fn on_keepalive(&mut self, uptime_ms: u64, rssi: Option<i32>) -> Result<(), FrameError> {
        let now = Utc::now();
        let booted_at = infer_boot_time(now, uptime_ms)?;

        if rssi.is_some() {
            let sent_at = self
                .outstanding_ping
                .take()
                .ok_or(KeepAliveRejection::UnsolicitedPong)?;
            self.latency_ms = Some(latency_ms(sent_at, now));
            self.rssi = rssi;
        }

        self.set_state(HubState::Online);
        self.write_presence(booted_at).await;

        if !self.announced_online {
            self.announced_online = true;
            self.notify_status(true).await;
        }
        Ok(())
    }

    async fn write_presence(&mut self, booted_at: DateTime<Utc>) {
        let mut record = PresenceRecord {
            id: self.handle.hub_id().to_string(),
            owner: self.handle.owner_id().to_string(),
            gateway: self.services.gateway_fqdn.clone(),
            firmware_version: Some(self.handle.firmware().clone()),
            connected_at: self.connected_at,
            booted_at,
            latency_ms: self.latency_ms,
            rssi: self.rssi,
        };
        let ttl = self.timing().presence_ttl();
        let presence = Arc::clone(&self.services.presence);

        if let Some(previous) = &self.written
            && !previous.differs_from(&record)
        {
            let hub_id = record.id.clone();
            let refreshed = self
                .bounded("presence refresh", {
                    let presence = Arc::clone(&presence);
                    async move { presence.refresh(&hub_id, ttl).await }
                })
                .await;
            match refreshed {
                Some(Ok(true)) => return,
                Some(Ok(false)) => debug!("Presence expired, rewriting"),
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to refresh presence");
                    return;
                }
                None => return,
            }
            // Keep the boot time already published.
            record.booted_at = previous.booted_at;
        }

        let upsert = {
            let record = record.clone();
            async move { presence.upsert(&record, ttl).await }
        };
        match self.bounded("presence upsert", upsert).await {
            Some(Ok(())) => self.written = Some(record),
            Some(Err(e)) => warn!(error = %e, "Failed to write presence"),
            None => {}
        }
    }

    async fn notify_status(&self, online: bool) {
        let event = HubEvent::HubStatus {
            hub_id: self.handle.hub_id().to_string(),
            online,
            firmware_version: Some(self.handle.firmware().clone()),
        };
        let notifier = Arc::clone(&self.services.notifier);
        let owner = self.handle.owner_id().to_string();
        let result = tokio::time::timeout(self.timing().io_timeout(), async move {
            notifier.notify(&owner, &event).await
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, online, "Failed to publish hub status"),
            Err(_) => warn!(online, "Publishing hub status timed out"),
        }
    }

    /// Run a downstream call bounded by the I/O timeout and the connection's
    /// cancellation. `None` when either cut it short.
    async fn bounded<F, T>(&self, what: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let cancel = self.handle.cancellation();
        match tokio::time::timeout(self.timing().io_timeout(), cancel.run_until_cancelled(fut))
            .await
        {
            Ok(Some(value)) => Some(value),
            Ok(None) => None,
            Err(_) => {
                warn!(call = what, "Downstream call timed out");
                None
            }
        }
    }

    async fn shutdown(
        self,
        reason: CloseReason,
        mut writer: tokio::task::JoinHandle<()>,
        mut lease: SlotLease,
    ) {
        let close_wait = self.timing().close_timeout();
        let (code, text) = reason.close_frame();

        let queued = tokio::time::timeout(
            close_wait,
            self.handle.enqueue_wait(WireFrame::close(code, text)),
        )
        .await;
        if !matches!(queued, Ok(Ok(()))) {
            debug!("Could not queue close frame");
        }
        if tokio::time::timeout(close_wait, &mut writer).await.is_err() {
            debug!(wait = ?close_wait, "Close handshake timed out, aborting socket");
            writer.abort();
        }
        // Make sure nothing else is accepted for this connection.
        self.handle.cancellation().cancel();

        if self.written.is_some() {
            let presence = Arc::clone(&self.services.presence);
            let hub_id = self.handle.hub_id().to_string();
            let gateway = self.services.gateway_fqdn.clone();
            match tokio::time::timeout(
                self.timing().io_timeout(),
                presence.remove(&hub_id, &gateway),
            )
            .await
            {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "Failed to remove presence"),
                Err(_) => warn!("Removing presence timed out"),
            }
        }
        if self.announced_online {
            self.notify_status(false).await;
        }

        self.set_state(HubState::Closed);
        lease.release();
        info!(reason = ?reason, code, "Hub disconnected");
    }
}
