//! Version 1 of the hub wire schema.
//!
//! Both protocol variants (`/1/ws/hub` keep-alive and `/2/ws/hub` ping/pong)
//! share this schema; the variant only decides which payloads are legal.

/// Semantic version as carried on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SemVer {
    #[prost(uint32, tag = "1")]
    pub major: u32,
    #[prost(uint32, tag = "2")]
    pub minor: u32,
    #[prost(uint32, tag = "3")]
    pub patch: u32,
    #[prost(string, tag = "4")]
    pub prerelease: String,
    #[prost(string, tag = "5")]
    pub build: String,
}

// =========================================================================
// Hub → gateway
// =========================================================================

/// Envelope for every frame sent by a hub.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HubMessage {
    #[prost(oneof = "hub_message::Payload", tags = "1, 2, 3, 4, 5, 6")]
    pub payload: Option<hub_message::Payload>,
}

pub mod hub_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        KeepAlive(super::KeepAlive),
        #[prost(message, tag = "2")]
        Pong(super::Pong),
        #[prost(message, tag = "3")]
        OtaUpdateStarted(super::OtaUpdateStarted),
        #[prost(message, tag = "4")]
        OtaUpdateProgress(super::OtaUpdateProgress),
        #[prost(message, tag = "5")]
        OtaUpdateFailed(super::OtaUpdateFailed),
        #[prost(message, tag = "6")]
        BootStatus(super::BootStatus),
    }
}

/// Periodic liveness report from a keep-alive (V1) hub.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeepAlive {
    /// Milliseconds since the hub booted.
    #[prost(uint64, tag = "1")]
    pub uptime_ms: u64,
}

/// Answer to a gateway [`Ping`] from a V2 hub.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pong {
    /// Milliseconds since the hub booted.
    #[prost(uint64, tag = "1")]
    pub uptime_ms: u64,
    /// Wi-Fi signal strength in dBm.
    #[prost(int32, tag = "2")]
    pub rssi: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OtaUpdateStarted {
    #[prost(int32, tag = "1")]
    pub update_id: i32,
    #[prost(message, optional, tag = "2")]
    pub version: Option<SemVer>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OtaUpdateProgress {
    #[prost(int32, tag = "1")]
    pub update_id: i32,
    #[prost(enumeration = "OtaUpdateTask", tag = "2")]
    pub task: i32,
    /// Task progress in the range `0.0..=1.0`.
    #[prost(float, tag = "3")]
    pub progress: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OtaUpdateFailed {
    #[prost(int32, tag = "1")]
    pub update_id: i32,
    #[prost(bool, tag = "2")]
    pub fatal: bool,
    #[prost(string, tag = "3")]
    pub message: String,
}

/// Sent once after the hub finished booting.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BootStatus {
    #[prost(enumeration = "BootType", tag = "1")]
    pub boot_type: i32,
    /// Update the hub was working on before this boot, `0` when none.
    #[prost(int32, tag = "2")]
    pub ota_update_id: i32,
    #[prost(message, optional, tag = "3")]
    pub firmware_version: Option<SemVer>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BootType {
    Normal = 0,
    NewFirmware = 1,
    Rollback = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OtaUpdateTask {
    FetchingMetadata = 0,
    PreparingForInstall = 1,
    FlashingFilesystem = 2,
    VerifyingFilesystem = 3,
    FlashingApplication = 4,
    MarkingApplicationBootable = 5,
    Rebooting = 6,
}

impl OtaUpdateTask {
    /// Stable name used in owner notifications.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FetchingMetadata => "fetching_metadata",
            Self::PreparingForInstall => "preparing_for_install",
            Self::FlashingFilesystem => "flashing_filesystem",
            Self::VerifyingFilesystem => "verifying_filesystem",
            Self::FlashingApplication => "flashing_application",
            Self::MarkingApplicationBootable => "marking_application_bootable",
            Self::Rebooting => "rebooting",
        }
    }
}

// =========================================================================
// Gateway → hub
// =========================================================================

/// Envelope for every frame sent to a hub.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GatewayMessage {
    #[prost(oneof = "gateway_message::Payload", tags = "1, 2, 3, 4")]
    pub payload: Option<gateway_message::Payload>,
}

pub mod gateway_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        ShockerCommandList(super::ShockerCommandList),
        #[prost(message, tag = "2")]
        Trigger(super::Trigger),
        #[prost(message, tag = "3")]
        OtaUpdateRequest(super::OtaUpdateRequest),
        #[prost(message, tag = "4")]
        Ping(super::Ping),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShockerCommandList {
    #[prost(message, repeated, tag = "1")]
    pub commands: Vec<ShockerCommand>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShockerCommand {
    #[prost(enumeration = "ShockerModel", tag = "1")]
    pub model: i32,
    /// Radio identifier the shocker is paired with.
    #[prost(uint32, tag = "2")]
    pub rf_id: u32,
    #[prost(enumeration = "ShockerCommandType", tag = "3")]
    pub command_type: i32,
    #[prost(uint32, tag = "4")]
    pub intensity: u32,
    #[prost(uint32, tag = "5")]
    pub duration_ms: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ShockerModel {
    CaiXianlin = 0,
    PetTrainer = 1,
    Petrainer998Dr = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ShockerCommandType {
    Stop = 0,
    Shock = 1,
    Vibrate = 2,
    Sound = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Trigger {
    #[prost(enumeration = "TriggerType", tag = "1")]
    pub trigger_type: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TriggerType {
    CaptivePortalEnable = 0,
    CaptivePortalDisable = 1,
    EmergencyStop = 2,
    Reboot = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OtaUpdateRequest {
    #[prost(message, optional, tag = "1")]
    pub version: Option<SemVer>,
}

/// Latency probe sent to V2 hubs.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ping {
    #[prost(uint64, tag = "1")]
    pub unix_utc_time_ms: u64,
}
