//! `Firmware-Version` header parsing.

use crate::error::{Error, Result};

/// Header every hub must send on the WebSocket handshake.
pub const FIRMWARE_VERSION_HEADER: &str = "Firmware-Version";

/// Parse a header value as a strict semantic version.
///
/// Leading `v`, surrounding whitespace and partial versions are rejected.
pub fn parse_firmware_version(value: &str) -> Result<semver::Version> {
    if value.trim() != value || value.is_empty() {
        return Err(Error::FirmwareVersion {
            value: value.to_string(),
            reason: "empty or padded value".to_string(),
        });
    }
    semver::Version::parse(value).map_err(|e| Error::FirmwareVersion {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
