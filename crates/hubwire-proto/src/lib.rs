//! Hubwire wire protocol
//!
//! Binary messages exchanged between hubs and the gateway over the hub
//! WebSocket. Every WebSocket binary frame carries exactly one envelope:
//! - [`HubMessage`] for hub → gateway traffic
//! - [`GatewayMessage`] for gateway → hub traffic
//!
//! The envelopes are protobuf encoded. The message definitions live in
//! [`v1`] and are written with `prost` derives so no code generation step is
//! needed.

#![allow(clippy::derive_partial_eq_without_eq)]

pub mod v1;

mod codec;

pub use codec::{ProtocolError, decode_gateway_message, decode_hub_message, encode};
pub use v1::*;
