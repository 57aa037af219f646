//! Cross-gateway hub command bus.
//!
//! Other services publish `{"hubId": .., "command": {..}}` to
//! [`COMMAND_CHANNEL`]. Every gateway listens; only the one holding the
//! hub's slot acts on a message.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hub::{ControlCommand, HubCommandError};
use crate::lifetime::HubLifetimeManager;

pub const COMMAND_CHANNEL: &str = "hubwire:hub-commands";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum HubCommand {
    Control { commands: Vec<ControlCommand> },
    CaptivePortal { enable: bool },
    OtaInstall { version: semver::Version },
    Reboot,
    EmergencyStop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub hub_id: String,
    pub command: HubCommand,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// The hub is not connected to this gateway.
    NotHere,
    Rejected(HubCommandError),
}

/// Hand `envelope` to the local hub actor, if this gateway holds the slot.
pub fn dispatch(lifetime: &HubLifetimeManager, envelope: &CommandEnvelope) -> DispatchOutcome {
    let Some(hub) = lifetime.get(&envelope.hub_id) else {
        return DispatchOutcome::NotHere;
    };
    let result = match &envelope.command {
        HubCommand::Control { commands } => hub.control(commands),
        HubCommand::CaptivePortal { enable } => hub.captive_portal(*enable),
        HubCommand::OtaInstall { version } => hub.ota_install(version),
        HubCommand::Reboot => hub.reboot(),
        HubCommand::EmergencyStop => hub.emergency_stop(),
    };
    match result {
        Ok(()) => DispatchOutcome::Delivered,
        Err(e) => DispatchOutcome::Rejected(e),
    }
}

/// Decode one bus message and dispatch it.
pub fn handle_message(lifetime: &HubLifetimeManager, payload: &str) {
    let envelope: CommandEnvelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Malformed hub command on bus");
            return;
        }
    };
    match dispatch(lifetime, &envelope) {
        DispatchOutcome::Delivered => {
            debug!(hub_id = %envelope.hub_id, "Hub command delivered");
        }
        DispatchOutcome::NotHere => {}
        DispatchOutcome::Rejected(e) => {
            warn!(hub_id = %envelope.hub_id, error = %e, "Hub command rejected");
        }
    }
}

/// Subscribe to the command bus and dispatch until `cancel` fires.
pub async fn run_subscriber(
    client: redis::Client,
    lifetime: HubLifetimeManager,
    cancel: CancellationToken,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(COMMAND_CHANNEL).await?;
    info!(channel = COMMAND_CHANNEL, "Subscribed to hub command bus");

    let mut messages = pubsub.on_message();
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            message = messages.next() => {
                let Some(message) = message else {
                    warn!("Hub command bus subscription ended");
                    break;
                };
                match message.get_payload::<String>() {
                    Ok(payload) => handle_message(&lifetime, &payload),
                    Err(e) => warn!(error = %e, "Unreadable hub command payload"),
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use hubwire_core::ControlType;
    use hubwire_proto::{TriggerType, decode_gateway_message, gateway_message};

    use super::*;
    use crate::hub::{HubHandle, HubIdentity, ProtocolVariant, ShockerModel};
    use crate::lifetime::AcquireOutcome;
    use crate::transport::WireFrame;

    #[test]
    fn envelope_json_shape() {
        let envelope: CommandEnvelope = serde_json::from_str(
            r#"{"hubId":"hub-1","command":{"type":"control","commands":[
                {"model":"caiXianlin","rfId":7,"type":"vibrate","intensity":40,"durationMs":1000}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(envelope.hub_id, "hub-1");
        assert_eq!(
            envelope.command,
            HubCommand::Control {
                commands: vec![ControlCommand {
                    model: ShockerModel::CaiXianlin,
                    rf_id: 7,
                    control_type: ControlType::Vibrate,
                    intensity: 40,
                    duration_ms: 1000,
                }]
            }
        );

        let reboot: CommandEnvelope =
            serde_json::from_str(r#"{"hubId":"h","command":{"type":"reboot"}}"#).unwrap();
        assert_eq!(reboot.command, HubCommand::Reboot);

        let portal: CommandEnvelope = serde_json::from_str(
            r#"{"hubId":"h","command":{"type":"captivePortal","enable":true}}"#,
        )
        .unwrap();
        assert_eq!(portal.command, HubCommand::CaptivePortal { enable: true });
    }

    #[tokio::test]
    async fn only_the_slot_holder_acts() {
        let lifetime = HubLifetimeManager::new(1, Duration::from_millis(1));
        let envelope = CommandEnvelope {
            hub_id: "hub-1".into(),
            command: HubCommand::EmergencyStop,
        };
        assert_eq!(dispatch(&lifetime, &envelope), DispatchOutcome::NotHere);

        let (handle, mut mailbox) = HubHandle::new(
            HubIdentity {
                hub_id: "hub-1".into(),
                owner_id: "owner-1".into(),
            },
            semver::Version::new(1, 0, 0),
            ProtocolVariant::V2,
            &CancellationToken::new(),
            4,
        );
        let AcquireOutcome::Acquired(_lease) = lifetime.try_acquire(handle).await.unwrap() else {
            panic!("expected acquisition");
        };

        assert_eq!(dispatch(&lifetime, &envelope), DispatchOutcome::Delivered);
        let Some(WireFrame::Binary(frame)) = mailbox.outbound.recv().await else {
            panic!("expected a queued frame");
        };
        let gateway_message::Payload::Trigger(trigger) = decode_gateway_message(&frame).unwrap()
        else {
            panic!("expected a trigger");
        };
        assert_eq!(trigger.trigger_type(), TriggerType::EmergencyStop);
    }

    #[tokio::test]
    async fn unsupported_commands_are_rejected() {
        let lifetime = HubLifetimeManager::new(1, Duration::from_millis(1));
        let (handle, _mailbox) = HubHandle::new(
            HubIdentity {
                hub_id: "hub-1".into(),
                owner_id: "owner-1".into(),
            },
            semver::Version::new(1, 0, 0),
            ProtocolVariant::V1,
            &CancellationToken::new(),
            4,
        );
        let _lease = lifetime.try_acquire(handle).await.unwrap();
        let outcome = dispatch(
            &lifetime,
            &CommandEnvelope {
                hub_id: "hub-1".into(),
                command: HubCommand::Reboot,
            },
        );
        assert_eq!(
            outcome,
            DispatchOutcome::Rejected(HubCommandError::Unsupported("reboot"))
        );
        handle_message(&lifetime, "{not json");
    }
}
