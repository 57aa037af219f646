//! Hub protocol variants and keep-alive arithmetic.

use chrono::{DateTime, TimeZone, Utc};

/// Earliest boot time accepted from a hub (2024-01-01T00:00:00Z).
pub const BOOT_EPOCH_UNIX_SECS: i64 = 1_704_067_200;

/// Boot time differences at or below this are reporting jitter.
pub const BOOT_JITTER_SECS: i64 = 5;

/// Wire variant, selected by the connection route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// `/1/ws/hub`: hub-driven `KeepAlive`, no gateway pings.
    V1,
    /// `/2/ws/hub`: gateway `Ping`, hub answers with `Pong`.
    V2,
}

impl ProtocolVariant {
    pub const fn supports_ping(self) -> bool {
        matches!(self, Self::V2)
    }

    /// Reboot and emergency stop triggers need the V2 firmware.
    pub const fn supports_extended_triggers(self) -> bool {
        matches!(self, Self::V2)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum KeepAliveRejection {
    #[error("uptime {uptime_ms}ms implies a boot before the accepted epoch")]
    BootBeforeEpoch { uptime_ms: u64 },

    #[error("pong received without an outstanding ping")]
    UnsolicitedPong,
}

pub fn boot_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(BOOT_EPOCH_UNIX_SECS, 0)
        .single()
        .unwrap_or_default()
}

/// Infer when the hub booted from its reported uptime.
pub fn infer_boot_time(
    now: DateTime<Utc>,
    uptime_ms: u64,
) -> Result<DateTime<Utc>, KeepAliveRejection> {
    let rejected = KeepAliveRejection::BootBeforeEpoch { uptime_ms };
    let uptime = i64::try_from(uptime_ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .ok_or_else(|| rejected.clone())?;
    let booted = now.checked_sub_signed(uptime).ok_or_else(|| rejected.clone())?;
    if booted < boot_epoch() {
        return Err(rejected);
    }
    Ok(booted)
}

/// Round-trip time between a ping and its pong, never negative.
pub fn latency_ms(sent_at: DateTime<Utc>, received_at: DateTime<Utc>) -> u64 {
    u64::try_from((received_at - sent_at).num_milliseconds()).unwrap_or(0)
}

/// Whether a new ping may be sent. An outstanding ping blocks the next one
/// until it is answered or older than `expiry`.
pub fn ping_due(
    outstanding: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    expiry: std::time::Duration,
) -> bool {
    let Some(sent_at) = outstanding else {
        return true;
    };
    chrono::Duration::from_std(expiry).map_or(true, |expiry| now - sent_at >= expiry)
}

/// Whether two inferred boot times differ by more than jitter.
pub fn boot_time_changed(previous: DateTime<Utc>, current: DateTime<Utc>) -> bool {
    (current - previous).num_seconds().abs() > BOOT_JITTER_SECS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn boot_time_is_now_minus_uptime() {
        let now = at(BOOT_EPOCH_UNIX_SECS + 10_000);
        assert_eq!(
            infer_boot_time(now, 4_000_000).unwrap(),
            at(BOOT_EPOCH_UNIX_SECS + 6_000)
        );
    }

    #[test]
    fn boot_before_epoch_is_rejected() {
        let now = at(BOOT_EPOCH_UNIX_SECS + 10);
        assert_eq!(
            infer_boot_time(now, 11_000),
            Err(KeepAliveRejection::BootBeforeEpoch { uptime_ms: 11_000 })
        );
        assert!(infer_boot_time(now, 10_000).is_ok());
        assert!(infer_boot_time(now, u64::MAX).is_err());
    }

    #[test]
    fn latency_floors_at_zero() {
        assert_eq!(latency_ms(at(100), at(99)), 0);
        assert_eq!(
            latency_ms(at(100), at(100) + chrono::Duration::milliseconds(42)),
            42
        );
    }

    #[test]
    fn outstanding_ping_blocks_until_expired() {
        let expiry = std::time::Duration::from_secs(30);
        assert!(ping_due(None, at(100), expiry));
        assert!(!ping_due(Some(at(100)), at(115), expiry));
        assert!(!ping_due(Some(at(100)), at(129), expiry));
        assert!(ping_due(Some(at(100)), at(130), expiry));
    }

    #[test]
    fn jitter_threshold() {
        assert!(!boot_time_changed(at(1_000), at(1_005)));
        assert!(!boot_time_changed(at(1_005), at(1_000)));
        assert!(boot_time_changed(at(1_000), at(1_006)));
    }

    #[test]
    fn only_v2_pings() {
        assert!(!ProtocolVariant::V1.supports_ping());
        assert!(ProtocolVariant::V2.supports_ping());
    }
}
