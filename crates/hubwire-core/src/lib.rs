//! `Hubwire` Core Library
//!
//! Shared functionality for `Hubwire` components:
//! - Configuration resolution and hierarchy
//! - Control permission evaluation for shared shockers
//! - Region selection and great-circle distance
//! - Firmware version parsing
//! - `SQLite` pool helpers
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod firmware;
pub mod permissions;
pub mod region;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use permissions::{ControlType, SharePermissions, is_allowed};
pub use region::{CountryInfo, Region};
