//! JSON envelope of the live control protocol.
//!
//! Requests look like `{"requestType": "Frame", "data": {...}}`, responses
//! like `{"responseType": "Ping", "data": {...}}`.

use hubwire_core::ControlType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveFrame {
    pub shocker: String,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub intensity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PongData {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveRequest {
    Pong(PongData),
    Frame(LiveFrame),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "responseType", content = "data")]
pub enum LiveResponse {
    Ping {
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    LatencyAnnounce {
        user_id: String,
        latency_ms: u64,
    },
    DeviceNotConnected,
    ShockerNotFound,
    ShockerPaused,
    ShockerMissingPermission,
    ShockerMissingLivePermission,
    InvalidData,
    RequestTypeNotFound,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(rename = "requestType")]
    request_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parse a client text frame. The error is the response to send back.
pub fn parse_request(text: &str) -> Result<LiveRequest, LiveResponse> {
    let raw: RawRequest = serde_json::from_str(text).map_err(|_| LiveResponse::InvalidData)?;
    match raw.request_type.as_str() {
        "Pong" => serde_json::from_value(raw.data)
            .map(LiveRequest::Pong)
            .map_err(|_| LiveResponse::InvalidData),
        "Frame" => serde_json::from_value(raw.data)
            .map(LiveRequest::Frame)
            .map_err(|_| LiveResponse::InvalidData),
        _ => Err(LiveResponse::RequestTypeNotFound),
    }
}

impl LiveResponse {
    pub fn to_json(&self) -> String {
        // Serialising a plain enum of strings and integers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
