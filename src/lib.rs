//! Room-scoped real-time chat: short room codes, an ordered per-room log with
//! reply previews, live presence, and fan-out over WebSockets.

pub mod config;
pub mod error;
pub mod protocol;
pub mod room;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod utils {
    pub mod clean;
}

pub use config::Config;
pub use error::{AppErr, AppResult, ChatError};
pub use room::{Room, RoomRegistry};
pub use session::{Session, SessionState};
