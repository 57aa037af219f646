//! SQLite storage for the gateway.
//!
//! Holds the fields the gateway reads (hubs, shockers, shares) and the OTA
//! runs it writes.

mod db;
mod models;
mod queries;
mod queries_ota;


pub use db::{DatabaseError, GatewayDatabase};
pub use models::*;
pub use queries::ShareParams;
