//! Live rooms, keyed by code.
//!
//! Lock order is registry, then room. Creation and eviction hold the registry
//! write lock; everything room-local (joins, appends, leaves) holds only that
//! room's lock, so different rooms never contend.
//!
//! Rooms are evicted as soon as their last member leaves. Eviction marks the
//! room closed under its own lock, so a join that looked the room up just
//! before eviction fails with `RoomNotFound` instead of binding to a dead room.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::{
    error::ChatError,
    protocol::{JoinedServer, ServerEvent},
    room::{normalize, CodeGenerator, Content, ConnectionId, Message, MessageLog, MsgId, Outbox, PresenceTracker},
};

#[derive(Debug)]
struct RoomState {
    log: MessageLog,
    presence: PresenceTracker,
    closed: bool,
}

#[derive(Debug)]
pub struct Room {
    code: String,
    name: String,
    state: Mutex<RoomState>,
}

impl Room {
    fn new(code: String, name: String) -> Self {
        let log = MessageLog::new(code.clone());
        Self {
            code,
            name,
            state: Mutex::new(RoomState { log, presence: PresenceTracker::default(), closed: false }),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds a connection: `joined_server` to it, then `user_list` to all.
    pub async fn enter(&self, conn: ConnectionId, username: &str, outbox: Outbox) -> Result<usize, ChatError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ChatError::RoomNotFound(self.code.clone()));
        }
        let count = state.presence.add(conn, username, outbox);

        let joined = JoinedServer {
            server_id: self.code.clone(),
            server_name: self.name.clone(),
            history: state.log.history(),
            users_online: state.presence.usernames(),
        };
        state.presence.send_to(conn, ServerEvent::JoinedServer(joined));
        state.presence.notify();
        info!(room = %self.code, %conn, username, online = count, "member joined");
        Ok(count)
    }

    /// Unbinds a connection; remaining members get the new `user_list`.
    pub async fn leave(&self, conn: ConnectionId) -> usize {
        let mut state = self.state.lock().await;
        if !state.presence.contains(conn) {
            return state.presence.count();
        }
        let count = state.presence.remove(conn);
        state.presence.notify();
        info!(room = %self.code, %conn, online = count, "member left");
        count
    }

    /// Appends and fans out under one lock, so broadcast order is id order.
    pub async fn post(&self, username: &str, content: Content, reply_to: Option<MsgId>) -> Result<Message, ChatError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ChatError::RoomNotFound(self.code.clone()));
        }
        let message = state.log.append(username, content, reply_to)?;
        state.presence.broadcast(&ServerEvent::ChatMessage(message.clone()));
        Ok(message)
    }

    pub async fn history(&self) -> Vec<Message> {
        self.state.lock().await.log.history()
    }

    pub async fn member_count(&self) -> usize {
        self.state.lock().await.presence.count()
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    codes: CodeGenerator,
}

impl RoomRegistry {
    pub fn new(codes: CodeGenerator) -> Self {
        Self { rooms: RwLock::default(), codes }
    }

    pub async fn create_room(&self, name: &str) -> Result<Arc<Room>, ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::Validation("Server name must not be empty.".into()));
        }

        let mut rooms = self.rooms.write().await;
        let code = self.codes.generate(rooms.len(), |c| rooms.contains_key(c))?;
        let room = Arc::new(Room::new(code.clone(), name.to_owned()));
        rooms.insert(code, room.clone());
        info!(room = %room.code, name, live = rooms.len(), "room created");
        Ok(room)
    }

    /// Case-insensitive, whitespace-tolerant lookup.
    pub async fn join_room(&self, code: &str) -> Result<Arc<Room>, ChatError> {
        let code = normalize(code);
        if code.is_empty() {
            return Err(ChatError::Validation("Server code must not be empty.".into()));
        }
        self.lookup(&code).await.ok_or(ChatError::RoomNotFound(code))
    }

    pub async fn lookup(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(&normalize(code)).cloned()
    }

    /// Evicts `room` if nobody is in it. Only that exact room is considered;
    /// a newer room that happens to reuse the code is left alone.
    pub async fn remove_room_if_empty(&self, room: &Arc<Room>) -> bool {
        let mut rooms = self.rooms.write().await;
        if !rooms.get(&room.code).is_some_and(|live| Arc::ptr_eq(live, room)) {
            return false;
        }

        let mut state = room.state.lock().await;
        if !state.presence.is_empty() {
            return false;
        }
        state.closed = true;
        drop(state);

        rooms.remove(&room.code);
        info!(room = %room.code, live = rooms.len(), "room evicted");
        true
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::presence::OUTBOX_CAPACITY;

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let registry = RoomRegistry::default();
        for name in ["", "   ", "\t\n"] {
            assert!(matches!(registry.create_room(name).await, Err(ChatError::Validation(_))));
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn join_is_case_insensitive() {
        let registry = RoomRegistry::default();
        let room = registry.create_room("Alice's Room").await.unwrap();
        let lower = format!("  {} ", room.code().to_lowercase());
        let joined = registry.join_room(&lower).await.unwrap();
        assert!(Arc::ptr_eq(&room, &joined));
        assert_eq!(joined.name(), "Alice's Room");
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let registry = RoomRegistry::default();
        assert_eq!(
            registry.join_room("zzzz").await.unwrap_err(),
            ChatError::RoomNotFound("ZZZZ".into())
        );
    }

    #[tokio::test]
    async fn empty_room_is_evicted_and_closed() {
        let registry = RoomRegistry::default();
        let room = registry.create_room("r").await.unwrap();
        let (tx, _rx) = Outbox::channel(OUTBOX_CAPACITY);
        let conn = ConnectionId::new();

        room.enter(conn, "a", tx.clone()).await.unwrap();
        assert!(!registry.remove_room_if_empty(&room).await);

        room.leave(conn).await;
        assert!(registry.remove_room_if_empty(&room).await);
        assert!(registry.lookup(room.code()).await.is_none());
        assert!(matches!(room.enter(conn, "a", tx).await, Err(ChatError::RoomNotFound(_))));
        assert!(matches!(room.post("a", Content::text("hi").unwrap(), None).await, Err(ChatError::RoomNotFound(_))));
    }

    #[tokio::test]
    async fn stale_room_handle_does_not_evict_live_room() {
        let registry = RoomRegistry::new(CodeGenerator::with_alphabet(b"Q", 1));
        let old = registry.create_room("old").await.unwrap();
        assert!(registry.remove_room_if_empty(&old).await);

        let new = registry.create_room("new").await.unwrap();
        assert_eq!(old.code(), new.code());
        assert!(!registry.remove_room_if_empty(&old).await);
        assert!(registry.lookup("q").await.is_some());
    }

    #[tokio::test]
    async fn concurrent_creates_get_distinct_codes() {
        let registry = Arc::new(RoomRegistry::new(CodeGenerator::with_alphabet(b"AB", 4)));
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create_room(&format!("room {i}")).await })
            })
            .collect();

        let mut codes = Vec::new();
        for task in tasks {
            codes.push(task.await.unwrap().unwrap().code().to_owned());
        }
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 16);
        assert!(matches!(registry.create_room("overflow").await, Err(ChatError::Internal(_))));
    }
}
