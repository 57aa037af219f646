//! Hub connection lifetimes.

mod manager;

pub use manager::{AcquireOutcome, HubLifetimeManager, LifetimeError, SlotLease};
