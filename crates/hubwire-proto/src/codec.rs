//! Envelope encoding and semantic-version conversion.

use prost::Message;

use crate::v1::{GatewayMessage, HubMessage, SemVer, gateway_message, hub_message};

/// Errors produced while decoding a wire frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Frame carries no payload")]
    EmptyPayload,

    #[error("Invalid version: {0}")]
    InvalidVersion(String),
}

/// Encode any envelope into a binary frame.
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

/// Decode a hub → gateway frame, rejecting envelopes without a payload.
pub fn decode_hub_message(frame: &[u8]) -> Result<hub_message::Payload, ProtocolError> {
    HubMessage::decode(frame)?
        .payload
        .ok_or(ProtocolError::EmptyPayload)
}

/// Decode a gateway → hub frame, rejecting envelopes without a payload.
pub fn decode_gateway_message(frame: &[u8]) -> Result<gateway_message::Payload, ProtocolError> {
    GatewayMessage::decode(frame)?
        .payload
        .ok_or(ProtocolError::EmptyPayload)
}

impl From<hub_message::Payload> for HubMessage {
    fn from(payload: hub_message::Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }
}

impl From<gateway_message::Payload> for GatewayMessage {
    fn from(payload: gateway_message::Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }
}

impl TryFrom<&semver::Version> for SemVer {
    type Error = ProtocolError;

    fn try_from(version: &semver::Version) -> Result<Self, Self::Error> {
        let part = |n: u64| {
            u32::try_from(n).map_err(|_| ProtocolError::InvalidVersion(version.to_string()))
        };
        Ok(Self {
            major: part(version.major)?,
            minor: part(version.minor)?,
            patch: part(version.patch)?,
            prerelease: version.pre.to_string(),
            build: version.build.to_string(),
        })
    }
}

impl TryFrom<&SemVer> for semver::Version {
    type Error = ProtocolError;

    fn try_from(wire: &SemVer) -> Result<Self, Self::Error> {
        let invalid = |e: semver::Error| ProtocolError::InvalidVersion(e.to_string());
        let mut version = Self::new(
            u64::from(wire.major),
            u64::from(wire.minor),
            u64::from(wire.patch),
        );
        if !wire.prerelease.is_empty() {
            version.pre = semver::Prerelease::new(&wire.prerelease).map_err(invalid)?;
        }
        if !wire.build.is_empty() {
            version.build = semver::BuildMetadata::new(&wire.build).map_err(invalid)?;
        }
        Ok(version)
    }
}
