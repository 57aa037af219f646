//! Hub connections: protocol actor, command handle, OTA dispatch.

mod actor;
mod command;
mod handle;
mod ota;
pub mod protocol;

pub use actor::{CloseReason, HubActor, HubServices};
pub use command::{
    ControlCommand, HubCommandError, MAX_COMMANDS_PER_LIST, MAX_DURATION_MS, MAX_INTENSITY,
    MIN_DURATION_MS, ShockerModel,
};
pub use handle::{HubHandle, HubIdentity, HubMailbox, HubState};
pub use ota::{
    EXPLICIT_ROLLBACK_MESSAGE, IMPLICIT_ROLLBACK_MESSAGE, OtaDispatcher, OtaReport,
    OtaReportError,
};
pub use protocol::ProtocolVariant;
