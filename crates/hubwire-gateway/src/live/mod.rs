//! Live control relay: end-user sessions that stream control frames to a hub.

mod access;
mod group;
mod messages;
mod session;

pub use access::{LIVE_FRAME_DURATION_MS, LiveScope};
pub use group::{GroupMembership, LiveGroups};
pub use messages::{LiveFrame, LiveRequest, LiveResponse, PongData, parse_request};
pub use session::{LiveSession, SessionEnd};
