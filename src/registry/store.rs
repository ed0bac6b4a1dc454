//! Room registry implementation
//!
//! The central registry that tracks which connection follows which match
//! and fans published snapshots out to the members of a room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::protocol::{FrameCodec, ServerEvent};
use crate::snapshot::{MatchId, StateSnapshot};
use crate::stats::RelayStats;

use super::config::RegistryConfig;
use super::entry::{ConnectionId, Delivery, RoomEntry, RoomStats, Subscriber};

/// Outcome of a join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Connection was in no room before
    Joined,
    /// Connection moved here from another room
    Moved { from: MatchId },
    /// Connection was already a member of this room
    AlreadyMember,
}

#[derive(Default)]
struct Rooms {
    rooms: HashMap<MatchId, RoomEntry>,
    /// Reverse index: the single room each connection belongs to
    membership: HashMap<ConnectionId, MatchId>,
}

impl Rooms {
    fn detach(&mut self, id: ConnectionId) -> Option<MatchId> {
        let match_id = self.membership.remove(&id)?;
        if let Some(room) = self.rooms.get_mut(&match_id) {
            room.remove(id);
        }
        Some(match_id)
    }
}

/// Central registry for all match rooms
///
/// Membership changes take the write lock and publishes take the read lock,
/// so join, leave and publish on a room never interleave. Fan-out itself
/// only enqueues onto per-connection queues and never blocks.
pub struct RoomRegistry {
    inner: RwLock<Rooms>,
    codec: FrameCodec,
    stats: Arc<RelayStats>,
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create a new room registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new room registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_stats(config, Arc::new(RelayStats::new()))
    }

    /// Create a registry that records into shared relay counters
    pub fn with_stats(config: RegistryConfig, stats: Arc<RelayStats>) -> Self {
        Self {
            inner: RwLock::new(Rooms::default()),
            codec: FrameCodec::new(config.max_frame_size),
            stats,
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the relay counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Make `subscriber` a member of the room for `match_id`
    ///
    /// A connection belongs to at most one room: joining a different room
    /// removes it from the previous one first. Unknown match ids create a
    /// new room.
    pub async fn join(&self, subscriber: Subscriber, match_id: &MatchId) -> JoinOutcome {
        let mut inner = self.inner.write().await;
        let id = subscriber.id();

        let current = inner.membership.get(&id).cloned();
        let outcome = match current {
            Some(current) if &current == match_id => JoinOutcome::AlreadyMember,
            Some(_) => match inner.detach(id) {
                Some(from) => JoinOutcome::Moved { from },
                None => JoinOutcome::Joined,
            },
            None => JoinOutcome::Joined,
        };

        let room = inner
            .rooms
            .entry(match_id.clone())
            .or_insert_with(RoomEntry::new);
        room.insert(subscriber);
        let members = room.member_count();
        inner.membership.insert(id, match_id.clone());

        match &outcome {
            JoinOutcome::Moved { from } => tracing::info!(
                connection_id = id,
                from = %from,
                match_id = %match_id,
                members = members,
                "Subscriber moved rooms"
            ),
            JoinOutcome::Joined => tracing::info!(
                connection_id = id,
                match_id = %match_id,
                members = members,
                "Subscriber joined"
            ),
            JoinOutcome::AlreadyMember => tracing::debug!(
                connection_id = id,
                match_id = %match_id,
                "Subscriber re-joined same room"
            ),
        }

        outcome
    }

    /// Remove connection `id` from whatever room it belongs to
    ///
    /// Returns the room it left, or `None` if it was in no room.
    pub async fn leave(&self, id: ConnectionId) -> Option<MatchId> {
        let left = self.inner.write().await.detach(id);

        if let Some(ref match_id) = left {
            tracing::debug!(connection_id = id, match_id = %match_id, "Subscriber left");
        }

        left
    }

    /// Fan `snapshot` out to every member of the room for `match_id`
    ///
    /// The `updated` frame is encoded once and shared by all members.
    /// Returns the number of members the frame was queued for; a room with no
    /// members yields 0.
    pub async fn publish(&self, match_id: &MatchId, snapshot: &StateSnapshot) -> usize {
        let event = ServerEvent::Updated {
            snapshot: snapshot.clone(),
        };

        match self.codec.encode(&event) {
            Ok(frame) => self.publish_frame(match_id, frame).await,
            Err(e) => {
                self.stats.publish_rejected();
                tracing::warn!(match_id = %match_id, error = %e, "Dropping unencodable snapshot");
                0
            }
        }
    }

    /// Fan an already-encoded frame out to the room for `match_id`
    pub async fn publish_frame(&self, match_id: &MatchId, frame: Bytes) -> usize {
        let mut queued = 0;
        let mut closed = Vec::new();

        {
            let inner = self.inner.read().await;

            if let Some(room) = inner.rooms.get(match_id) {
                room.record_publish();

                for member in room.members() {
                    match member.deliver(frame.clone()) {
                        Delivery::Queued => queued += 1,
                        Delivery::Lagging => {
                            self.stats.delivery_dropped();
                            tracing::warn!(
                                connection_id = member.id(),
                                match_id = %match_id,
                                "Subscriber lagging, snapshot dropped"
                            );
                        }
                        Delivery::Closed => closed.push(member.id()),
                    }
                }
            }
        }

        self.stats.publish_accepted(queued);

        if !closed.is_empty() {
            self.prune(match_id, &closed).await;
        }

        tracing::trace!(match_id = %match_id, delivered = queued, "Snapshot published");
        queued
    }

    /// Remove members whose connection queue is gone
    async fn prune(&self, match_id: &MatchId, ids: &[ConnectionId]) {
        let mut inner = self.inner.write().await;

        for &id in ids {
            let still_closed = inner
                .rooms
                .get(match_id)
                .and_then(|room| room.members().find(|m| m.id() == id))
                .map(Subscriber::is_closed)
                .unwrap_or(false);

            if still_closed && inner.membership.get(&id) == Some(match_id) {
                inner.detach(id);
                tracing::debug!(connection_id = id, match_id = %match_id, "Pruned closed subscriber");
            }
        }
    }

    /// Room the connection currently belongs to
    pub async fn room_of(&self, id: ConnectionId) -> Option<MatchId> {
        self.inner.read().await.membership.get(&id).cloned()
    }

    /// Get room statistics
    pub async fn get_room_stats(&self, match_id: &MatchId) -> Option<RoomStats> {
        self.inner.read().await.rooms.get(match_id).map(RoomEntry::stats)
    }

    /// Get total number of rooms, including empty ones not yet reclaimed
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Get total number of connections that are in a room
    pub async fn member_count(&self) -> usize {
        self.inner.read().await.membership.len()
    }

    /// Run cleanup once
    ///
    /// Removes rooms that have been empty for longer than `idle_room_timeout`.
    /// Returns the number of rooms removed.
    pub async fn cleanup(&self) -> usize {
        let mut inner = self.inner.write().await;
        let now = Instant::now();
        let timeout = self.config.idle_room_timeout;
        let before = inner.rooms.len();

        inner.rooms.retain(|match_id, room| {
            let keep = !room.is_empty() || room.idle_for(now).map_or(true, |idle| idle <= timeout);
            if !keep {
                tracing::debug!(match_id = %match_id, "Reclaiming empty room");
            }
            keep
        });

        let removed = before - inner.rooms.len();
        if removed > 0 {
            tracing::info!(count = removed, "Cleaned up empty rooms");
        }
        removed
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup().await;
            }
        })
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
