//! Per-connection state machine.
//!
//! A connection is either `Unbound` or `Bound` to exactly one room. Create and
//! join are only accepted while unbound; a bound connection must leave first.
//! Failed requests are answered with `server_error` on the requester's own
//! outbox and leave both the connection and the room as they were.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use crate::{
    error::ChatError,
    protocol::{display_name, ChatMessage, ClientEvent, CreateServer, FileMessage, JoinServer, ServerEvent},
    room::{normalize, ConnectionId, Content, Message, Outbox, Room, RoomRegistry},
    storage::{FileStore, StoredFile},
};

#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    Unbound,
    Bound { room: Arc<Room>, username: String },
}

impl SessionState {
    pub fn room_code(&self) -> Option<&str> {
        match self {
            SessionState::Unbound => None,
            SessionState::Bound { room, .. } => Some(room.code()),
        }
    }
}

pub struct Session {
    id: ConnectionId,
    registry: Arc<RoomRegistry>,
    outbox: Outbox,
    state: SessionState,
}

impl Session {
    pub fn new(registry: Arc<RoomRegistry>, outbox: Outbox) -> Self {
        Self { id: ConnectionId::new(), registry, outbox, state: SessionState::Unbound }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Decodes one text frame and dispatches it; errors go back to this
    /// connection only.
    pub async fn handle_text(&mut self, raw: &str) {
        let result = match ClientEvent::decode(raw) {
            Ok(event) => self.handle(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.reject(&e);
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) -> Result<(), ChatError> {
        match event {
            ClientEvent::CreateServer(req) => self.create(req).await,
            ClientEvent::JoinServer(req)   => self.join(req).await,
            ClientEvent::ChatMessage(req)  => self.chat(req).await,
            ClientEvent::FileMessage(req)  => self.file(req).await,
            ClientEvent::LeaveServer(_)    => self.leave().await,
        }
    }

    /// Transport is gone: release presence, evict the room if it emptied.
    pub async fn disconnect(&mut self) {
        self.unbind().await;
    }

    fn reject(&self, e: &ChatError) {
        match e {
            ChatError::Internal(detail) => tracing::error!(conn = %self.id, detail = %detail, "request failed"),
            _ => warn!(conn = %self.id, kind = e.kind(), error = %e, "request rejected"),
        }
        let _ = self.outbox.send(ServerEvent::error(e));
    }

    async fn create(&mut self, req: CreateServer) -> Result<(), ChatError> {
        self.ensure_unbound()?;
        let room = self.registry.create_room(&req.server_name).await?;
        let username = display_name(req.username.as_deref());
        if let Err(e) = self.bind(room.clone(), username).await {
            self.registry.remove_room_if_empty(&room).await;
            return Err(e);
        }
        Ok(())
    }

    async fn join(&mut self, req: JoinServer) -> Result<(), ChatError> {
        self.ensure_unbound()?;
        let room = self.registry.join_room(&req.server_id).await?;
        self.bind(room, display_name(req.username.as_deref())).await
    }

    async fn chat(&mut self, req: ChatMessage) -> Result<(), ChatError> {
        let (room, username) = self.bound()?;
        if let Some(code) = req.server_id.as_deref().map(normalize) {
            if !code.is_empty() && code != room.code() {
                return Err(ChatError::NotBound);
            }
        }
        room.post(username, Content::text(&req.text)?, req.reply_to).await?;
        Ok(())
    }

    async fn file(&mut self, req: FileMessage) -> Result<(), ChatError> {
        let (room, username) = self.bound()?;
        room.post(username, Content::file(&req.file_name, &req.file_url)?, req.reply_to).await?;
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), ChatError> {
        let code = self.unbind().await.ok_or(ChatError::NotBound)?;
        let _ = self.outbox.send(ServerEvent::LeftServer { server_id: code });
        Ok(())
    }

    async fn bind(&mut self, room: Arc<Room>, username: String) -> Result<(), ChatError> {
        room.enter(self.id, &username, self.outbox.clone()).await?;
        self.state = SessionState::Bound { room, username };
        Ok(())
    }

    async fn unbind(&mut self) -> Option<String> {
        let SessionState::Bound { room, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        room.leave(self.id).await;
        self.registry.remove_room_if_empty(&room).await;
        Some(room.code().to_owned())
    }

    fn ensure_unbound(&self) -> Result<(), ChatError> {
        match self.state.room_code() {
            Some(code) => Err(ChatError::AlreadyBound(code.to_owned())),
            None => Ok(()),
        }
    }

    fn bound(&self) -> Result<(&Arc<Room>, &str), ChatError> {
        match &self.state {
            SessionState::Bound { room, username } => Ok((room, username)),
            SessionState::Unbound => Err(ChatError::NotBound),
        }
    }
}

/// Out-of-band upload: store the bytes with no room lock held, then post the
/// file message. A room evicted in between yields `RoomNotFound`.
pub async fn deliver_upload(
    registry: &RoomRegistry,
    store: &dyn FileStore,
    server_id: &str,
    username: Option<&str>,
    original_name: &str,
    bytes: Bytes,
) -> Result<(Message, StoredFile), ChatError> {
    let room = registry.join_room(server_id).await?;
    let stored = store.put(room.code(), original_name, bytes).await?;
    let content = Content::file(&stored.file_name, &stored.file_url)?;
    let message = room.post(&display_name(username), content, None).await?;
    Ok((message, stored))
}
