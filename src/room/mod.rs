//! Room state: codes, the per-room message log, presence, and the registry
//! that owns the live rooms.

pub mod code;
pub mod log;
pub mod presence;
pub mod registry;

pub use code::{normalize, CodeGenerator};
pub use log::{Content, Message, MessageLog, MsgId};
pub use presence::{ConnectionId, Outbox, PresenceTracker, OUTBOX_CAPACITY};
pub use registry::{Room, RoomRegistry};
