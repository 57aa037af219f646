//! Shared tracing/logging initialization.
//!
//! The gateway sets up `tracing_subscriber` with an env-filter and a choice
//! between human-readable and JSON lines. JSON lines carry the current span
//! so per-connection fields (`hub_id`, `user_id`) land on every event.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub const fn from_flag(log_json: bool) -> Self {
        if log_json { Self::Json } else { Self::Pretty }
    }
}

/// Build the env-filter, preferring `RUST_LOG` over `default_filter`.
fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- filter used when `RUST_LOG` is unset or invalid
///   (e.g. `"hubwire_gateway=info,tower_http=info"`).
/// * `format` -- pretty or JSON output.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(default_filter));
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
            .is_ok(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_flag() {
        assert_eq!(LogFormat::from_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_flag(false), LogFormat::Pretty);
    }

    #[test]
    fn second_init_reports_false() {
        let _ = init_tracing("warn", LogFormat::Pretty);
        assert!(!init_tracing("warn", LogFormat::Json));
    }
}
