//! `Hubwire` gateway: the real-time endpoint hubs and live-control clients
//! connect to.
//!
//! - [`hub`]: one protocol actor per connected hub
//! - [`lifetime`]: at most one connection slot per hub ID
//! - [`presence`]: TTL-bound online records
//! - [`live`]: end-user live control sessions
//! - [`server`]: axum routes and WebSocket handshakes

pub mod auth;
pub mod backends;
pub mod commands;
pub mod hub;
pub mod lifetime;
pub mod live;
pub mod node;
pub mod notifications;
pub mod ota;
pub mod presence;
pub mod server;
pub mod storage;
pub mod transport;
