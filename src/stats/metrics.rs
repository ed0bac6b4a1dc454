//! Counters for the relay server and sync agents

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live relay counters, shared between the listener, connections and registry
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    publishes: AtomicU64,
    rejected_publishes: AtomicU64,
    deliveries: AtomicU64,
    dropped_deliveries: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            publishes: AtomicU64::new(0),
            rejected_publishes: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            dropped_deliveries: AtomicU64::new(0),
        }
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn publish_accepted(&self, delivered: usize) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
    }

    pub(crate) fn publish_rejected(&self) {
        self.rejected_publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivery_dropped(&self) {
        self.dropped_deliveries.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn report(&self, active_rooms: usize) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            rejected_publishes: self.rejected_publishes.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped_deliveries: self.dropped_deliveries.load(Ordering::Relaxed),
            active_rooms: active_rooms as u64,
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Accepted publish events
    pub publishes: u64,
    /// Publish events dropped for a malformed snapshot
    pub rejected_publishes: u64,
    /// Snapshots handed to subscriber queues
    pub deliveries: u64,
    /// Snapshots dropped because a subscriber queue was full
    pub dropped_deliveries: u64,
    /// Rooms currently tracked
    pub active_rooms: u64,
    /// Uptime
    pub uptime: Duration,
}

/// Per-agent counters
#[derive(Debug, Default)]
pub struct AgentStats {
    relay_received: AtomicU64,
    bus_received: AtomicU64,
    polls_found: AtomicU64,
    polls_not_found: AtomicU64,
    polls_failed: AtomicU64,
    polls_timed_out: AtomicU64,
    dropped_malformed: AtomicU64,
    emitted: AtomicU64,
    suppressed: AtomicU64,
}

impl AgentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn relay_received(&self) {
        self.relay_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bus_received(&self) {
        self.bus_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_found(&self) {
        self.polls_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_not_found(&self) {
        self.polls_not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_failed(&self) {
        self.polls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn poll_timed_out(&self) {
        self.polls_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped_malformed(&self) {
        self.dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn report(&self) -> AgentStatsReport {
        AgentStatsReport {
            relay_received: self.relay_received.load(Ordering::Relaxed),
            bus_received: self.bus_received.load(Ordering::Relaxed),
            polls_found: self.polls_found.load(Ordering::Relaxed),
            polls_not_found: self.polls_not_found.load(Ordering::Relaxed),
            polls_failed: self.polls_failed.load(Ordering::Relaxed),
            polls_timed_out: self.polls_timed_out.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`AgentStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStatsReport {
    /// Snapshots pushed by the relay
    pub relay_received: u64,
    /// State updates received on the local bus
    pub bus_received: u64,
    /// Polls that returned a snapshot
    pub polls_found: u64,
    /// Polls answered with "not found"
    pub polls_not_found: u64,
    /// Polls that failed (network, status, bad payload)
    pub polls_failed: u64,
    /// Polls cut off by the request timeout
    pub polls_timed_out: u64,
    /// Payloads dropped before reaching the filter
    pub dropped_malformed: u64,
    /// Snapshots emitted to the consumer
    pub emitted: u64,
    /// Snapshots suppressed as duplicates
    pub suppressed: u64,
}

impl AgentStatsReport {
    /// Total polls that completed or were cut off
    pub fn polls(&self) -> u64 {
        self.polls_found + self.polls_not_found + self.polls_failed + self.polls_timed_out
    }
}
