//! Configuration resolution for the Hubwire gateway.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Config file (`~/.config/hubwire/gateway.json` or an explicit path)
//! 3. Environment variables (`HUBWIRE_*`)
//! 4. CLI arguments (applied by the binary, highest priority)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Identity and listening configuration of this gateway instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Public FQDN hubs and clients reach this instance under.
    pub fqdn: String,
    /// ISO 3166-1 alpha-2 code of the country this instance runs in.
    pub country_code: String,
    pub database_path: Option<PathBuf>,
    pub jwt_secret: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            fqdn: "localhost".to_string(),
            country_code: "DE".to_string(),
            database_path: None,
            jwt_secret: "dev-secret-change-me".to_string(),
        }
    }
}

/// Timers and bounds of the connection lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Silence after which a hub connection is force-closed.
    pub keepalive_timeout_secs: u64,
    /// Interval between gateway pings on ping-capable hub connections.
    pub hub_ping_interval_secs: u64,
    /// TTL of presence records, refreshed by every accepted keep-alive.
    pub presence_ttl_secs: u64,
    /// Interval between pings on live control sessions.
    pub live_ping_interval_secs: u64,
    /// Wait for the close handshake before the socket is aborted.
    pub close_timeout_secs: u64,
    /// Polls for the previous slot owner to release during displacement.
    pub acquire_attempts: u32,
    pub acquire_backoff_ms: u64,
    /// Bound on a single presence/OTA/notification call.
    pub io_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            keepalive_timeout_secs: 65,
            hub_ping_interval_secs: 15,
            presence_ttl_secs: 65,
            live_ping_interval_secs: 5,
            close_timeout_secs: 5,
            acquire_attempts: 10,
            acquire_backoff_ms: 50,
            io_timeout_ms: 3_000,
        }
    }
}

impl TimingConfig {
    pub const fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    pub const fn hub_ping_interval(&self) -> Duration {
        Duration::from_secs(self.hub_ping_interval_secs)
    }

    pub const fn presence_ttl(&self) -> Duration {
        Duration::from_secs(self.presence_ttl_secs)
    }

    pub const fn live_ping_interval(&self) -> Duration {
        Duration::from_secs(self.live_ping_interval_secs)
    }

    pub const fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    pub const fn acquire_backoff(&self) -> Duration {
        Duration::from_millis(self.acquire_backoff_ms)
    }

    pub const fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Upper bound on one connection's close path: the close handshake and
    /// writer wait, then the presence removal and offline notification.
    pub const fn drain_timeout(&self) -> Duration {
        self.close_timeout()
            .saturating_add(self.io_timeout())
            .saturating_mul(2)
    }
}

/// Shared Redis used for presence, owner events and the command bus.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RedisConfig {
    /// `None` runs the gateway in single-node mode with in-process stores.
    pub url: Option<String>,
}

impl Config {
    /// Reject values the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if t.keepalive_timeout_secs == 0 || t.presence_ttl_secs == 0 {
            return Err(Error::Config(
                "keep-alive timeout and presence TTL must be positive".to_string(),
            ));
        }
        if t.hub_ping_interval_secs == 0 || t.live_ping_interval_secs == 0 {
            return Err(Error::Config("ping intervals must be positive".to_string()));
        }
        if t.hub_ping_interval_secs >= t.keepalive_timeout_secs {
            return Err(Error::Config(
                "hub ping interval must be shorter than the keep-alive timeout".to_string(),
            ));
        }
        if t.acquire_attempts == 0 {
            return Err(Error::Config("acquire_attempts must be at least 1".to_string()));
        }
        if self.gateway.country_code.len() != 2 {
            return Err(Error::Config(format!(
                "country code '{}' is not an alpha-2 code",
                self.gateway.country_code
            )));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the default location is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => load_config_file(&p)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Default config file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hubwire").join("gateway.json"))
}

/// Default `SQLite` database location.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("hubwire").join("gateway.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("HUBWIRE_LISTEN_ADDR")
        && let Ok(addr) = val.parse()
    {
        config.gateway.listen_addr = addr;
    }
    if let Some(val) = var("HUBWIRE_FQDN") {
        config.gateway.fqdn = val;
    }
    if let Some(val) = var("HUBWIRE_COUNTRY_CODE") {
        config.gateway.country_code = val.to_ascii_uppercase();
    }
    if let Some(val) = var("HUBWIRE_DATABASE_PATH") {
        config.gateway.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("HUBWIRE_JWT_SECRET") {
        config.gateway.jwt_secret = val;
    }
    if let Some(val) = var("HUBWIRE_REDIS_URL") {
        config.redis.url = Some(val).filter(|u| !u.is_empty());
    }
    if let Some(val) = var("HUBWIRE_KEEPALIVE_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.timing.keepalive_timeout_secs = n;
    }
    if let Some(val) = var("HUBWIRE_PRESENCE_TTL_SECS")
        && let Ok(n) = val.parse()
    {
        config.timing.presence_ttl_secs = n;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.keepalive_timeout(), Duration::from_secs(65));
        assert_eq!(config.timing.acquire_attempts, 10);
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(
            &path,
            r#"{"gateway": {"fqdn": "eu1.gw.example.net"}, "timing": {"presence_ttl_secs": 90}}"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.gateway.fqdn, "eu1.gw.example.net");
        assert_eq!(config.gateway.country_code, "DE");
        assert_eq!(config.timing.presence_ttl_secs, 90);
        assert_eq!(config.timing.keepalive_timeout_secs, 65);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/hubwire.json"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("HUBWIRE_FQDN", "us1.gw.example.net"),
            ("HUBWIRE_COUNTRY_CODE", "us"),
            ("HUBWIRE_REDIS_URL", "redis://127.0.0.1/"),
            ("HUBWIRE_KEEPALIVE_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        apply_overrides(&mut config, |k| vars.get(k).map(ToString::to_string));

        assert_eq!(config.gateway.fqdn, "us1.gw.example.net");
        assert_eq!(config.gateway.country_code, "US");
        assert_eq!(config.redis.url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.timing.keepalive_timeout_secs, 65);
    }

    #[test]
    fn drain_covers_close_and_cleanup() {
        let timing = TimingConfig::default();
        assert_eq!(timing.drain_timeout(), Duration::from_secs(16));
    }

    #[test]
    fn ping_interval_must_undercut_keepalive() {
        let mut config = Config::default();
        config.timing.hub_ping_interval_secs = 65;
        assert!(config.validate().is_err());
    }
}
