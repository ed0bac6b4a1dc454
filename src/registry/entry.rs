//! Room entry and subscriber handle types
//!
//! This module defines the per-room state stored in the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Identifier of one relay connection
pub type ConnectionId = u64;

/// Handle the registry uses to reach one connection
///
/// Wraps the sending half of the connection's outbound queue. The queue is
/// drained by the connection's own writer task, so handing a frame to it
/// never waits on the socket.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    tx: mpsc::Sender<Bytes>,
}

/// Result of handing a frame to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Frame queued
    Queued,
    /// Queue full; frame dropped for this subscriber only
    Lagging,
    /// Connection is gone
    Closed,
}

impl Subscriber {
    /// Create a handle for connection `id`
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Connection id
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the connection's queue has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(super) fn deliver(&self, frame: Bytes) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Lagging,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Entry for a single match room
pub struct RoomEntry {
    /// Current members keyed by connection id
    members: HashMap<ConnectionId, Subscriber>,

    /// Number of publishes fanned out through this room
    published: AtomicU64,

    /// When the room was created
    pub created_at: Instant,

    /// When the last member left (None while the room has members)
    pub emptied_at: Option<Instant>,
}

impl RoomEntry {
    pub(super) fn new() -> Self {
        let now = Instant::now();
        Self {
            members: HashMap::new(),
            published: AtomicU64::new(0),
            created_at: now,
            emptied_at: Some(now),
        }
    }

    /// Add or refresh a member; returns true if it was not a member before
    pub(super) fn insert(&mut self, subscriber: Subscriber) -> bool {
        self.emptied_at = None;
        self.members.insert(subscriber.id(), subscriber).is_none()
    }

    /// Remove a member; returns true if it was present
    pub(super) fn remove(&mut self, id: ConnectionId) -> bool {
        let removed = self.members.remove(&id).is_some();
        if removed && self.members.is_empty() {
            self.emptied_at = Some(Instant::now());
        }
        removed
    }

    pub(super) fn members(&self) -> impl Iterator<Item = &Subscriber> {
        self.members.values()
    }

    pub(super) fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if the room has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if `id` is a member
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    /// How long the room has been empty, if it is
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.emptied_at.map(|at| now.duration_since(at))
    }

    pub(super) fn stats(&self) -> RoomStats {
        RoomStats {
            member_count: self.member_count(),
            published: self.published.load(Ordering::Relaxed),
            age: self.created_at.elapsed(),
            idle_for: self.idle_for(Instant::now()),
        }
    }
}

/// Statistics for a room
#[derive(Debug, Clone)]
pub struct RoomStats {
    /// Number of current members
    pub member_count: usize,
    /// Publishes fanned out through this room
    pub published: u64,
    /// Time since the room was created
    pub age: Duration,
    /// Time since the room became empty
    pub idle_for: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_tracks_emptiness() {
        let (tx, _rx) = mpsc::channel(4);
        let mut room = RoomEntry::new();
        assert!(room.is_empty());
        assert!(room.emptied_at.is_some());

        assert!(room.insert(Subscriber::new(1, tx.clone())));
        assert!(!room.insert(Subscriber::new(1, tx)));
        assert_eq!(room.member_count(), 1);
        assert!(room.emptied_at.is_none());

        assert!(room.remove(1));
        assert!(!room.remove(1));
        assert!(room.is_empty());
        assert!(room.emptied_at.is_some());
    }

    #[test]
    fn test_delivery_outcomes() {
        let (tx, rx) = mpsc::channel(1);
        let subscriber = Subscriber::new(7, tx);

        assert_eq!(subscriber.deliver(Bytes::from_static(b"a")), Delivery::Queued);
        assert_eq!(subscriber.deliver(Bytes::from_static(b"b")), Delivery::Lagging);

        drop(rx);
        assert!(subscriber.is_closed());
        assert_eq!(subscriber.deliver(Bytes::from_static(b"c")), Delivery::Closed);
    }
}
