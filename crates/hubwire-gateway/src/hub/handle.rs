//! Cloneable handle to a connected hub's actor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use hubwire_proto::{Ping, TriggerType, gateway_message};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::command::{
    ControlCommand, HubCommandError, encode_control, encode_ota_request, encode_payload,
    encode_trigger,
};
use super::protocol::ProtocolVariant;
use crate::transport::WireFrame;

/// Immutable identity of an authenticated hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubIdentity {
    pub hub_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// Slot acquired, no keep-alive accepted yet.
    Registered,
    Online,
    /// Keep-alives overdue but the timeout has not fired.
    Stale,
    Closed,
}

struct Inner {
    identity: HubIdentity,
    firmware: semver::Version,
    protocol: ProtocolVariant,
    outbound: mpsc::Sender<WireFrame>,
    cancel: CancellationToken,
    displaced: AtomicBool,
    state: watch::Receiver<HubState>,
}

/// Everything the handle hands over to the actor that drives it.
pub struct HubMailbox {
    pub outbound: mpsc::Receiver<WireFrame>,
    pub state: watch::Sender<HubState>,
}

/// Entry point for talking to one hub. Every command is encoded here and
/// queued for the connection's writer task.
#[derive(Clone)]
pub struct HubHandle {
    inner: Arc<Inner>,
}

impl HubHandle {
    /// Create a handle whose cancellation is a child of `parent`.
    pub fn new(
        identity: HubIdentity,
        firmware: semver::Version,
        protocol: ProtocolVariant,
        parent: &CancellationToken,
        queue_depth: usize,
    ) -> (Self, HubMailbox) {
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_depth);
        let (state_tx, state_rx) = watch::channel(HubState::Registered);
        let handle = Self {
            inner: Arc::new(Inner {
                identity,
                firmware,
                protocol,
                outbound: outbound_tx,
                cancel: parent.child_token(),
                displaced: AtomicBool::new(false),
                state: state_rx,
            }),
        };
        (
            handle,
            HubMailbox {
                outbound: outbound_rx,
                state: state_tx,
            },
        )
    }

    pub fn hub_id(&self) -> &str {
        &self.inner.identity.hub_id
    }

    pub fn owner_id(&self) -> &str {
        &self.inner.identity.owner_id
    }

    pub fn identity(&self) -> &HubIdentity {
        &self.inner.identity
    }

    pub fn firmware(&self) -> &semver::Version {
        &self.inner.firmware
    }

    pub fn protocol(&self) -> ProtocolVariant {
        self.inner.protocol
    }

    pub fn state(&self) -> HubState {
        *self.inner.state.borrow()
    }

    /// Whether two handles refer to the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Ask the actor to close because a newer connection wants the slot.
    pub fn disconnect(&self) {
        self.inner.displaced.store(true, Ordering::SeqCst);
        self.inner.cancel.cancel();
    }

    pub fn is_displaced(&self) -> bool {
        self.inner.displaced.load(Ordering::SeqCst)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn control(&self, commands: &[ControlCommand]) -> Result<(), HubCommandError> {
        let frame = encode_control(commands)?;
        self.enqueue(WireFrame::Binary(frame))
    }

    pub fn captive_portal(&self, enable: bool) -> Result<(), HubCommandError> {
        let trigger = if enable {
            TriggerType::CaptivePortalEnable
        } else {
            TriggerType::CaptivePortalDisable
        };
        self.enqueue(WireFrame::Binary(encode_trigger(trigger)))
    }

    pub fn ota_install(&self, version: &semver::Version) -> Result<(), HubCommandError> {
        let frame = encode_ota_request(version)?;
        self.enqueue(WireFrame::Binary(frame))
    }

    pub fn reboot(&self) -> Result<(), HubCommandError> {
        if !self.protocol().supports_extended_triggers() {
            return Err(HubCommandError::Unsupported("reboot"));
        }
        self.enqueue(WireFrame::Binary(encode_trigger(TriggerType::Reboot)))
    }

    pub fn emergency_stop(&self) -> Result<(), HubCommandError> {
        if !self.protocol().supports_extended_triggers() {
            return Err(HubCommandError::Unsupported("emergency stop"));
        }
        self.enqueue(WireFrame::Binary(encode_trigger(TriggerType::EmergencyStop)))
    }

    /// Queue a latency ping, returning the send time it carries.
    pub(crate) fn ping(&self) -> Result<chrono::DateTime<Utc>, HubCommandError> {
        let now = Utc::now();
        let frame = encode_payload(gateway_message::Payload::Ping(Ping {
            unix_utc_time_ms: u64::try_from(now.timestamp_millis()).unwrap_or(0),
        }));
        self.enqueue(WireFrame::Binary(frame))?;
        Ok(now)
    }

    pub(crate) fn enqueue(&self, frame: WireFrame) -> Result<(), HubCommandError> {
        if self.is_cancelled() {
            return Err(HubCommandError::Disconnected);
        }
        self.inner.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => HubCommandError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => HubCommandError::Disconnected,
        })
    }

    /// Queue a frame, waiting for room. Used for the final close frame.
    pub(crate) async fn enqueue_wait(&self, frame: WireFrame) -> Result<(), HubCommandError> {
        self.inner
            .outbound
            .send(frame)
            .await
            .map_err(|_| HubCommandError::Disconnected)
    }
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("hub_id", &self.hub_id())
            .field("protocol", &self.protocol())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use hubwire_core::ControlType;
    use hubwire_proto::decode_gateway_message;

    use crate::hub::ShockerModel;

    fn handle(protocol: ProtocolVariant, depth: usize) -> (HubHandle, HubMailbox) {
        HubHandle::new(
            HubIdentity {
                hub_id: "hub-1".into(),
                owner_id: "owner-1".into(),
            },
            semver::Version::new(1, 2, 3),
            protocol,
            &CancellationToken::new(),
            depth,
        )
    }

    fn vibrate() -> ControlCommand {
        ControlCommand {
            model: ShockerModel::PetTrainer,
            rf_id: 1,
            control_type: ControlType::Vibrate,
            intensity: 20,
            duration_ms: 500,
        }
    }

    #[tokio::test]
    async fn commands_are_queued_as_binary_frames() {
        let (hub, mut mailbox) = handle(ProtocolVariant::V2, 8);
        hub.control(&[vibrate()]).unwrap();
        hub.captive_portal(true).unwrap();
        hub.reboot().unwrap();

        for expected in [0, 1, 2] {
            let Some(WireFrame::Binary(frame)) = mailbox.outbound.recv().await else {
                panic!("expected binary frame {expected}");
            };
            let payload = decode_gateway_message(&frame).unwrap();
            match (expected, payload) {
                (0, gateway_message::Payload::ShockerCommandList(_)) => {}
                (1, gateway_message::Payload::Trigger(t)) => {
                    assert_eq!(t.trigger_type(), TriggerType::CaptivePortalEnable);
                }
                (2, gateway_message::Payload::Trigger(t)) => {
                    assert_eq!(t.trigger_type(), TriggerType::Reboot);
                }
                (n, other) => panic!("frame {n}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn v1_rejects_extended_triggers() {
        let (hub, _mailbox) = handle(ProtocolVariant::V1, 8);
        assert_eq!(hub.reboot(), Err(HubCommandError::Unsupported("reboot")));
        assert!(matches!(
            hub.emergency_stop(),
            Err(HubCommandError::Unsupported(_))
        ));
        assert!(hub.captive_portal(false).is_ok());
    }

    #[test]
    fn full_queue_and_closed_actor_are_reported() {
        let (hub, mailbox) = handle(ProtocolVariant::V2, 1);
        hub.captive_portal(true).unwrap();
        assert_eq!(hub.captive_portal(true), Err(HubCommandError::QueueFull));
        drop(mailbox);
        assert_eq!(hub.captive_portal(true), Err(HubCommandError::Disconnected));
    }

    #[test]
    fn disconnect_marks_displacement() {
        let (hub, _mailbox) = handle(ProtocolVariant::V1, 1);
        assert!(!hub.is_displaced());
        hub.disconnect();
        assert!(hub.is_displaced());
        assert!(hub.is_cancelled());
        assert_eq!(hub.captive_portal(true), Err(HubCommandError::Disconnected));
    }

    #[test]
    fn invalid_control_never_reaches_the_queue() {
        let (hub, mut mailbox) = handle(ProtocolVariant::V2, 4);
        let mut bad = vibrate();
        bad.duration_ms = 10;
        assert!(matches!(
            hub.control(&[bad]),
            Err(HubCommandError::InvalidCommand(_))
        ));
        assert!(mailbox.outbound.try_recv().is_err());
    }
}
