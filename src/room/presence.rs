//! Who is connected to a room, and the outboxes used to reach them.

use std::{collections::HashMap, fmt, sync::Arc};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Notify,
};
use tracing::warn;
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Events a connection may have queued before it counts as too slow.
pub const OUTBOX_CAPACITY: usize = 128;

/// Bounded sending half of a connection's event queue.
///
/// Sends never wait. A connection whose queue is full is dropped from its
/// room and its outbox is closed; the transport watches [`Outbox::closed`].
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<ServerEvent>,
    kick: Arc<Notify>,
}

impl Outbox {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, kick: Arc::new(Notify::new()) }, rx)
    }

    pub fn send(&self, event: ServerEvent) -> Result<(), TrySendError<ServerEvent>> {
        self.tx.try_send(event)
    }

    pub fn close(&self) {
        self.kick.notify_one();
    }

    /// Resolves once [`Outbox::close`] has been called on any clone.
    pub async fn closed(&self) {
        self.kick.notified().await;
    }
}

/// Opaque id of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug)]
struct Member {
    username: String,
    outbox: Outbox,
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    members: HashMap<ConnectionId, Member>,
}

impl PresenceTracker {
    /// Idempotent per connection; returns the new total.
    pub fn add(&mut self, conn: ConnectionId, username: &str, outbox: Outbox) -> usize {
        self.members
            .entry(conn)
            .or_insert_with(|| Member { username: username.to_owned(), outbox });
        self.members.len()
    }

    /// Removing an absent connection is a no-op.
    pub fn remove(&mut self, conn: ConnectionId) -> usize {
        self.members.remove(&conn);
        self.members.len()
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.members.contains_key(&conn)
    }

    /// Usernames online, sorted; duplicates are kept since names are not unique.
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.values().map(|m| m.username.clone()).collect();
        names.sort();
        names
    }

    /// Sends to every current member and returns the number of deliveries.
    ///
    /// Members whose outbox is full or gone are removed and their outbox
    /// closed; the rest then get a fresh user list.
    pub fn broadcast(&mut self, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (conn, member) in &self.members {
            match member.outbox.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%conn, username = %member.username, "outbox full, dropping member");
                    dropped.push(*conn);
                }
                Err(TrySendError::Closed(_)) => dropped.push(*conn),
            }
        }

        if !dropped.is_empty() {
            for conn in &dropped {
                if let Some(member) = self.members.remove(conn) {
                    member.outbox.close();
                }
            }
            self.notify();
        }
        delivered
    }

    /// A full outbox here is left for the next broadcast to deal with.
    pub fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.members.get(&conn).is_some_and(|m| m.outbox.send(event).is_ok())
    }

    /// Presence-change notification: the current user list to everyone.
    pub fn notify(&mut self) -> usize {
        let list = ServerEvent::UserList(self.usernames());
        self.broadcast(&list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn add_is_idempotent_per_connection() {
        let mut presence = PresenceTracker::default();
        let (tx, _rx) = Outbox::channel(OUTBOX_CAPACITY);
        let conn = ConnectionId::new();
        assert_eq!(presence.add(conn, "alice", tx.clone()), 1);
        assert_eq!(presence.add(conn, "alice", tx), 1);
        assert_eq!(presence.count(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut presence = PresenceTracker::default();
        let (tx, _rx) = Outbox::channel(OUTBOX_CAPACITY);
        let conn = ConnectionId::new();
        presence.add(conn, "alice", tx);
        assert_eq!(presence.remove(ConnectionId::new()), 1);
        assert_eq!(presence.remove(conn), 0);
        assert_eq!(presence.remove(conn), 0);
        assert!(presence.is_empty());
    }

    #[test]
    fn usernames_are_sorted_and_may_repeat() {
        let mut presence = PresenceTracker::default();
        let (tx, _rx) = Outbox::channel(OUTBOX_CAPACITY);
        presence.add(ConnectionId::new(), "zed", tx.clone());
        presence.add(ConnectionId::new(), "amy", tx.clone());
        presence.add(ConnectionId::new(), "amy", tx);
        assert_eq!(presence.usernames(), ["amy", "amy", "zed"]);
    }

    #[test]
    fn gone_members_are_dropped_on_broadcast() {
        let mut presence = PresenceTracker::default();
        let (tx_a, mut rx_a) = Outbox::channel(OUTBOX_CAPACITY);
        let (tx_b, rx_b) = Outbox::channel(OUTBOX_CAPACITY);
        presence.add(ConnectionId::new(), "a", tx_a);
        presence.add(ConnectionId::new(), "b", tx_b);
        drop(rx_b);

        assert_eq!(presence.notify(), 1);
        assert_eq!(presence.count(), 1);
        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::UserList(vec!["a".into(), "b".into()]));
        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::UserList(vec!["a".into()]));
    }

    #[tokio::test]
    async fn member_that_never_drains_is_dropped_and_closed() {
        let mut presence = PresenceTracker::default();
        let (fast, mut fast_rx) = Outbox::channel(OUTBOX_CAPACITY);
        let (slow, _slow_rx) = Outbox::channel(2);
        let slow_conn = ConnectionId::new();
        presence.add(ConnectionId::new(), "fast", fast);
        presence.add(slow_conn, "slow", slow.clone());

        for n in 0..3 {
            presence.broadcast(&ServerEvent::UserList(vec![n.to_string()]));
        }

        assert!(!presence.contains(slow_conn));
        assert_eq!(presence.usernames(), ["fast"]);
        tokio::time::timeout(Duration::from_secs(1), slow.closed()).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = fast_rx.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[3], ServerEvent::UserList(vec!["fast".into()]));
    }
}
