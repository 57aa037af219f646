//! One end-user live control session.

use std::fmt::Display;
use std::time::Duration;

use chrono::Utc;
use futures::{Sink, Stream, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::access::LiveScope;
use super::group::{GroupMembership, LiveGroups};
use super::messages::{LiveFrame, LiveRequest, LiveResponse, parse_request};
use crate::hub::HubCommandError;
use crate::lifetime::HubLifetimeManager;
use crate::transport::{
    CLOSE_NORMAL, CLOSE_SERVICE_RESTART, OUTBOUND_QUEUE_DEPTH, WireFrame, spawn_writer,
};

/// Why a live session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    ClientClosed,
    TransportError,
    Shutdown,
}

pub struct LiveSession {
    scope: LiveScope,
    lifetime: HubLifetimeManager,
    membership: GroupMembership,
    ping_interval: Duration,
    cancel: CancellationToken,
    latency_ms: u64,
}

impl LiveSession {
    /// Join the hub's session group. `cancel` is usually a child of the
    /// gateway's root token.
    pub fn new(
        scope: LiveScope,
        lifetime: HubLifetimeManager,
        groups: &LiveGroups,
        ping_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let membership = groups.join(scope.hub_id());
        Self {
            scope,
            lifetime,
            membership,
            ping_interval,
            cancel,
            latency_ms: 0,
        }
    }

    /// Last relay-to-client latency, zero until the first pong.
    pub const fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    #[instrument(
        name = "live",
        skip_all,
        fields(hub_id = %self.scope.hub_id(), user_id = %self.scope.user_id())
    )]
    pub async fn run<Si, St, E>(mut self, sink: Si, mut inbound: St) -> SessionEnd
    where
        Si: Sink<WireFrame> + Send + Unpin + 'static,
        Si::Error: Display,
        St: Stream<Item = Result<WireFrame, E>> + Unpin,
        E: Display,
    {
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let writer = spawn_writer(sink, rx);
        info!(owner = self.scope.is_owner(), "Live session opened");

        let mut ping = tokio::time::interval(self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break SessionEnd::Shutdown,
                _ = ping.tick() => {
                    send(&outbound, &LiveResponse::Ping {
                        timestamp: Utc::now().timestamp_millis(),
                    });
                }
                message = self.membership.recv() => match message {
                    Ok(message) => send(&outbound, &message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Live session lagged behind its group");
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },
                frame = inbound.next() => match frame {
                    None | Some(Ok(WireFrame::Close { .. })) => break SessionEnd::ClientClosed,
                    Some(Err(e)) => {
                        debug!(error = %e, "Live socket read failed");
                        break SessionEnd::TransportError;
                    }
                    Some(Ok(WireFrame::Text(text))) => {
                        if let Some(response) = self.handle_text(&text) {
                            send(&outbound, &response);
                        }
                    }
                    Some(Ok(WireFrame::Binary(_))) => send(&outbound, &LiveResponse::InvalidData),
                },
            }
        };

        let (code, reason) = match end {
            SessionEnd::Shutdown => (CLOSE_SERVICE_RESTART, "gateway shutting down"),
            SessionEnd::ClientClosed | SessionEnd::TransportError => (CLOSE_NORMAL, ""),
        };
        if outbound.try_send(WireFrame::close(code, reason)).is_err() {
            debug!("Could not queue live close frame");
        }
        drop(outbound);
        if let Err(e) = writer.await {
            debug!(error = %e, "Live writer task failed");
        }
        info!(end = ?end, "Live session closed");
        end
    }

    fn handle_text(&mut self, text: &str) -> Option<LiveResponse> {
        match parse_request(text) {
            Ok(LiveRequest::Pong(pong)) => {
                self.on_pong(pong.timestamp);
                None
            }
            Ok(LiveRequest::Frame(frame)) => self.on_frame(&frame),
            Err(response) => {
                debug!(response = ?response, "Rejected live request");
                Some(response)
            }
        }
    }

    fn on_pong(&mut self, echoed_ms: i64) {
        let elapsed = Utc::now().timestamp_millis().saturating_sub(echoed_ms);
        self.latency_ms = u64::try_from(elapsed).unwrap_or(0);
        self.membership.broadcast(LiveResponse::LatencyAnnounce {
            user_id: self.scope.user_id().to_string(),
            latency_ms: self.latency_ms,
        });
    }

    /// `None` when the frame was forwarded to the hub.
    fn on_frame(&self, frame: &LiveFrame) -> Option<LiveResponse> {
        let command = match self.scope.resolve(frame) {
            Ok(command) => command,
            Err(response) => return Some(response),
        };
        let Some(hub) = self.lifetime.get(self.scope.hub_id()) else {
            return Some(LiveResponse::DeviceNotConnected);
        };
        match hub.control(&[command]) {
            Ok(()) => None,
            Err(HubCommandError::Disconnected) => Some(LiveResponse::DeviceNotConnected),
            Err(HubCommandError::QueueFull) => {
                debug!("Hub queue full, dropping live frame");
                None
            }
            Err(e) => {
                warn!(error = %e, "Live frame rejected by hub handle");
                Some(LiveResponse::InvalidData)
            }
        }
    }
}

fn send(outbound: &mpsc::Sender<WireFrame>, response: &LiveResponse) {
    if outbound.try_send(WireFrame::Text(response.to_json())).is_err() {
        debug!("Live outbound queue full, dropping response");
    }
}
