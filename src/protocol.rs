//! Session wire format.
//!
//! Every WebSocket text frame is one JSON object `{"event": .., "data": ..}`.
//! A missing or `null` `data` is read as `{}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::ChatError,
    room::{Message, MsgId},
};

pub const ANONYMOUS: &str = "Anonymous";

/// Missing or blank usernames become [`ANONYMOUS`].
pub fn display_name(username: Option<&str>) -> String {
    match username.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => ANONYMOUS.to_owned(),
    }
}

/* ---------------- client → server ---------------- */

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    CreateServer(CreateServer),
    JoinServer(JoinServer),
    ChatMessage(ChatMessage),
    FileMessage(FileMessage),
    LeaveServer(LeaveServer),
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientEvent {
    pub fn decode(raw: &str) -> Result<Self, ChatError> {
        let malformed = |e: serde_json::Error| ChatError::Malformed(e.to_string());
        let Envelope { event, data } = serde_json::from_str(raw).map_err(malformed)?;
        let data = if data.is_null() { json!({}) } else { data };
        serde_json::from_value(json!({ "event": event, "data": data })).map_err(malformed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateServer {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub server_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JoinServer {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub server_id: String,
}

/// `username` is ignored in favour of the bound identity; a `server_id` other
/// than the bound room is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub reply_to: Option<MsgId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMessage {
    pub file_name: String,
    pub file_url: String,
    #[serde(default)]
    pub reply_to: Option<MsgId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LeaveServer {}

/* ---------------- server → client ---------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    JoinedServer(JoinedServer),
    ChatMessage(Message),
    UserList(Vec<String>),
    LeftServer { server_id: String },
    ServerError(ServerError),
}

impl ServerEvent {
    pub fn error(e: &ChatError) -> Self {
        ServerEvent::ServerError(ServerError { error: e.to_string(), kind: e.kind() })
    }

    pub fn encode(&self) -> String {
        // plain structs of strings and integers; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedServer {
    pub server_id: String,
    pub server_name: String,
    pub history: Vec<Message>,
    pub users_online: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerError {
    pub error: String,
    pub kind: &'static str,
}
