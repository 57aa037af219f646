//! Hubwire Gateway
//!
//! WebSocket endpoint for hubs and live-control clients.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use hubwire_core::config::{default_database_path, load_config};
use hubwire_core::tracing_init::{LogFormat, init_tracing};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hubwire_gateway::backends::{Backends, build_state};
use hubwire_gateway::server::{build_router, drain_connections};
use hubwire_gateway::storage::GatewayDatabase;
use hubwire_gateway::{commands, node};

#[derive(Parser, Debug)]
#[command(name = "hubwire-gateway")]
#[command(version, about = "Hubwire gateway - hub connections and live control relay")]
struct Args {
    /// Path to a JSON config file.
    #[arg(long, env = "HUBWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Public FQDN of this gateway.
    #[arg(long)]
    fqdn: Option<String>,

    /// Alpha-2 country code this gateway runs in.
    #[arg(long)]
    country: Option<String>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JWT secret key for user tokens.
    #[arg(long, env = "HUBWIRE_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Redis URL; omit for single-node mode.
    #[arg(long)]
    redis_url: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(
        "hubwire_gateway=info,tower_http=info",
        LogFormat::from_flag(args.log_json),
    );

    let mut config = load_config(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.gateway.listen_addr = addr;
    }
    if let Some(fqdn) = args.fqdn {
        config.gateway.fqdn = fqdn;
    }
    if let Some(country) = args.country {
        config.gateway.country_code = country.to_ascii_uppercase();
    }
    if let Some(path) = args.db_path {
        config.gateway.database_path = Some(path);
    }
    if let Some(secret) = args.jwt_secret {
        config.gateway.jwt_secret = secret;
    }
    if args.redis_url.is_some() {
        config.redis.url = args.redis_url;
    }
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.gateway.listen_addr,
        fqdn = %config.gateway.fqdn,
        "Starting hubwire-gateway"
    );

    let db_path = config
        .gateway
        .database_path
        .clone()
        .or_else(default_database_path)
        .ok_or_else(|| anyhow::anyhow!("Cannot determine database path"))?;
    info!(path = %db_path.display(), "Opening gateway database");
    let db = GatewayDatabase::open(&db_path).await?;

    let shutdown = CancellationToken::new();
    let redis_client = match &config.redis.url {
        Some(url) => Some(redis::Client::open(url.as_str())?),
        None => None,
    };
    let backends = match &redis_client {
        Some(client) => {
            let connection = redis::aio::ConnectionManager::new(client.clone()).await?;
            info!("Using Redis for presence, events and node announcements");
            Backends::redis(&connection)
        }
        None => {
            warn!("No Redis configured, running in single-node mode");
            Backends::in_process()
        }
    };
    let nodes = std::sync::Arc::clone(&backends.nodes);
    let state = build_state(&config, db, backends, shutdown.clone());

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(node::run_announcer(
        nodes,
        state.lifetime.clone(),
        config.gateway.fqdn.clone(),
        config.gateway.country_code.clone(),
        shutdown.child_token(),
    )));
    if let Some(client) = redis_client {
        let lifetime = state.lifetime.clone();
        let cancel = shutdown.child_token();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = commands::run_subscriber(client, lifetime, cancel).await {
                warn!(error = %e, "Hub command bus subscriber failed");
            }
        }));
    }

    let lifetime = state.lifetime.clone();
    let connections = state.connections.clone();
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.gateway.listen_addr).await?;

    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    info!(addr = %config.gateway.listen_addr, "Gateway ready");

    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            lifetime.begin_shutdown();
            signal_token.cancel();
        })
        .await?;

    info!(open = connections.len(), "Waiting for connections to close");
    if !drain_connections(&connections, config.timing.drain_timeout()).await {
        warn!(open = connections.len(), "Connections still open after drain timeout");
    }
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task failed");
        }
    }
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let sigterm_future = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}
