//! Per-room, append-only message log.
//!
//! Ids are a dense counter starting at 1, so `msg_id - 1` is the index of the
//! entry. Reply previews are resolved once, at append time, and stored on the
//! replying message; history replay never walks a reply chain.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::ChatError;

pub type MsgId = u64;

pub const MAX_TEXT_CHARS: usize = 500;
pub const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
    File { file_name: String, file_url: String },
}

impl Content {
    /// Rejects blank text; keeps at most [`MAX_TEXT_CHARS`] characters.
    pub fn text(raw: &str) -> Result<Self, ChatError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ChatError::Validation("Message text must not be empty.".into()));
        }
        Ok(Content::Text { text: trimmed.chars().take(MAX_TEXT_CHARS).collect() })
    }

    pub fn file(file_name: &str, file_url: &str) -> Result<Self, ChatError> {
        let file_name = file_name.trim();
        let file_url = file_url.trim();
        if file_name.is_empty() || file_url.is_empty() {
            return Err(ChatError::Validation("File messages need a name and a url.".into()));
        }
        Ok(Content::File { file_name: file_name.to_owned(), file_url: file_url.to_owned() })
    }

    /// What a reply shows of this message.
    pub fn display(&self) -> &str {
        match self {
            Content::Text { text } => text,
            Content::File { file_name, .. } => file_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub msg_id: MsgId,
    #[serde(rename = "server_id")]
    pub room_code: String,
    pub username: String,
    pub sent_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MsgId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_preview: Option<String>,
}

#[derive(Debug)]
pub struct MessageLog {
    room_code: String,
    entries: Vec<Message>,
    next_id: MsgId,
}

impl MessageLog {
    pub fn new(room_code: impl Into<String>) -> Self {
        Self { room_code: room_code.into(), entries: Vec::new(), next_id: 1 }
    }

    /// Appends a message. A `reply_to` that names no earlier message fails
    /// with `InvalidReply` and leaves the counter untouched.
    pub fn append(
        &mut self,
        username: &str,
        content: Content,
        reply_to: Option<MsgId>,
    ) -> Result<Message, ChatError> {
        let reply_preview = match reply_to {
            Some(id) => {
                let target = self.get(id).ok_or(ChatError::InvalidReply(id))?;
                Some(preview(target.content.display()))
            }
            None => None,
        };

        let message = Message {
            msg_id: self.next_id,
            room_code: self.room_code.clone(),
            username: username.to_owned(),
            sent_at: Utc::now(),
            content,
            reply_to,
            reply_preview,
        };
        self.next_id += 1;
        self.entries.push(message.clone());
        debug!(room = %self.room_code, msg_id = message.msg_id, "message appended");
        Ok(message)
    }

    pub fn get(&self, id: MsgId) -> Option<&Message> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    /// Snapshot of every message in arrival order.
    pub fn history(&self) -> Vec<Message> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_id(&self) -> Option<MsgId> {
        self.entries.last().map(|m| m.msg_id)
    }
}

fn preview(source: &str) -> String {
    if source.chars().count() > PREVIEW_CHARS {
        let mut cut: String = source.chars().take(PREVIEW_CHARS).collect();
        cut.push('…');
        cut
    } else {
        source.to_owned()
    }
}
