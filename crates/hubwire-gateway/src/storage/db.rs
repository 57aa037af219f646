//! Gateway database handle.

pub use hubwire_core::db::DatabaseError;

hubwire_core::define_database!(GatewayDatabase, "Gateway database migrations complete");
