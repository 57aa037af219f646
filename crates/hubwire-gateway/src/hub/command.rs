//! Outbound hub commands and their wire encoding.

use hubwire_core::ControlType;
use hubwire_proto::{
    GatewayMessage, OtaUpdateRequest, SemVer, ShockerCommand, ShockerCommandList,
    ShockerCommandType, Trigger, TriggerType, encode, gateway_message,
};
use serde::{Deserialize, Serialize};

pub const MAX_INTENSITY: u8 = 100;
pub const MIN_DURATION_MS: u16 = 300;
pub const MAX_DURATION_MS: u16 = 30_000;
pub const MAX_COMMANDS_PER_LIST: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HubCommandError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("{0} is not supported by this hub protocol")]
    Unsupported(&'static str),

    #[error("Hub outbound queue is full")]
    QueueFull,

    #[error("Hub is not connected")]
    Disconnected,
}

/// Radio protocol family of a shocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShockerModel {
    CaiXianlin,
    PetTrainer,
    Petrainer998Dr,
}

impl ShockerModel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CaiXianlin => "caiXianlin",
            Self::PetTrainer => "petTrainer",
            Self::Petrainer998Dr => "petrainer998Dr",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [Self::CaiXianlin, Self::PetTrainer, Self::Petrainer998Dr]
            .into_iter()
            .find(|m| m.as_str() == value)
    }

    const fn wire(self) -> hubwire_proto::ShockerModel {
        match self {
            Self::CaiXianlin => hubwire_proto::ShockerModel::CaiXianlin,
            Self::PetTrainer => hubwire_proto::ShockerModel::PetTrainer,
            Self::Petrainer998Dr => hubwire_proto::ShockerModel::Petrainer998Dr,
        }
    }
}

/// One radio command for a shocker paired with the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCommand {
    pub model: ShockerModel,
    pub rf_id: u16,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub intensity: u8,
    pub duration_ms: u16,
}

impl ControlCommand {
    fn validate(&self) -> Result<(), HubCommandError> {
        if self.intensity > MAX_INTENSITY {
            return Err(HubCommandError::InvalidCommand(format!(
                "intensity {} exceeds {MAX_INTENSITY}",
                self.intensity
            )));
        }
        if !(MIN_DURATION_MS..=MAX_DURATION_MS).contains(&self.duration_ms) {
            return Err(HubCommandError::InvalidCommand(format!(
                "duration {}ms outside {MIN_DURATION_MS}..={MAX_DURATION_MS}",
                self.duration_ms
            )));
        }
        Ok(())
    }

    fn to_wire(self) -> ShockerCommand {
        let command_type = match self.control_type {
            ControlType::Stop => ShockerCommandType::Stop,
            ControlType::Shock => ShockerCommandType::Shock,
            ControlType::Vibrate => ShockerCommandType::Vibrate,
            ControlType::Sound => ShockerCommandType::Sound,
        };
        ShockerCommand {
            model: self.model.wire() as i32,
            rf_id: u32::from(self.rf_id),
            command_type: command_type as i32,
            intensity: u32::from(self.intensity),
            duration_ms: u32::from(self.duration_ms),
        }
    }
}

/// Validate and encode a command list into a binary frame.
pub fn encode_control(commands: &[ControlCommand]) -> Result<Vec<u8>, HubCommandError> {
    if commands.is_empty() {
        return Err(HubCommandError::InvalidCommand("empty command list".into()));
    }
    if commands.len() > MAX_COMMANDS_PER_LIST {
        return Err(HubCommandError::InvalidCommand(format!(
            "{} commands exceed the limit of {MAX_COMMANDS_PER_LIST}",
            commands.len()
        )));
    }
    for command in commands {
        command.validate()?;
    }
    let list = ShockerCommandList {
        commands: commands.iter().map(|c| c.to_wire()).collect(),
    };
    Ok(encode_payload(gateway_message::Payload::ShockerCommandList(
        list,
    )))
}

pub fn encode_trigger(trigger: TriggerType) -> Vec<u8> {
    encode_payload(gateway_message::Payload::Trigger(Trigger {
        trigger_type: trigger as i32,
    }))
}

pub fn encode_ota_request(version: &semver::Version) -> Result<Vec<u8>, HubCommandError> {
    let version = SemVer::try_from(version)
        .map_err(|e| HubCommandError::InvalidCommand(e.to_string()))?;
    Ok(encode_payload(gateway_message::Payload::OtaUpdateRequest(
        OtaUpdateRequest {
            version: Some(version),
        },
    )))
}

pub fn encode_payload(payload: gateway_message::Payload) -> Vec<u8> {
    encode(&GatewayMessage::from(payload))
}
