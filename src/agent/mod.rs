//! Sync agent
//!
//! A sync agent keeps one consumer up to date with the state of one match.
//! Three sources feed it:
//!
//! ```text
//!   relay push ──────┐
//!   local bus ───────┼──> funnel ──> dedup loop ──> consumer channel
//!   timer ─> poller ─┘                    │
//!                                         └──> latest()
//! ```
//!
//! Each source is a task that only forwards candidates. The dedup loop is the
//! single owner of the [`DedupFilter`], so "is this new?" is decided in one
//! place no matter how many sources deliver the same content. The first copy
//! of a content to reach the loop is emitted; later copies are suppressed.
//!
//! [`SyncAgent::shutdown`] stops every source. Once it has begun nothing else
//! is emitted, even if a poll response or push was already in flight.

mod config;
mod source;

pub use config::AgentConfig;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bus::{LocalBus, STATE_TOPIC};
use crate::dedup::DedupFilter;
use crate::gateway::StateGateway;
use crate::snapshot::{MatchId, StateSnapshot};
use crate::stats::{AgentStats, AgentStatsReport};

use source::Candidate;

/// Resources held by a running agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Polling task, including any request in flight
    Poll,
    /// Relay connection and room membership
    RelaySubscription,
    /// Local bus subscription
    LocalChannel,
    /// Poll interval timer
    Timer,
}

/// What [`SyncAgent::shutdown`] released
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Resources stopped cleanly
    pub released: Vec<Resource>,
    /// Resources whose task had already failed
    pub failed: Vec<Resource>,
}

impl TeardownReport {
    /// Whether every resource stopped cleanly
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether there was nothing left to release
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.failed.is_empty()
    }
}

/// Live state follower for one match
pub struct SyncAgent {
    match_id: MatchId,
    stopped: Arc<AtomicBool>,
    stats: Arc<AgentStats>,
    latest: watch::Receiver<Option<StateSnapshot>>,
    poll: Option<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
    local_channel: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    emitter: Option<JoinHandle<()>>,
}

impl SyncAgent {
    /// Start following `config.match_id`
    ///
    /// Returns the agent handle and the channel of deduplicated snapshots.
    /// The local bus subscription is taken before this returns, so anything
    /// published on `bus` afterwards is seen. Must be called within a Tokio
    /// runtime.
    pub fn start(
        config: AgentConfig,
        gateway: Arc<dyn StateGateway>,
        bus: Option<&LocalBus>,
    ) -> (Self, mpsc::Receiver<StateSnapshot>) {
        let match_id = config.match_id.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(AgentStats::new());

        let (funnel, candidates) = mpsc::channel(config.funnel_capacity.max(1));
        let (output, updates) = mpsc::channel(config.output_capacity.max(1));
        let (latest_tx, latest) = watch::channel(None);

        let emitter = tokio::spawn(emit_loop(
            match_id.clone(),
            candidates,
            output,
            latest_tx,
            Arc::clone(&stopped),
            Arc::clone(&stats),
        ));

        let relay = config.relay.clone().map(|relay| {
            tokio::spawn(source::relay_source(
                relay,
                match_id.clone(),
                funnel.clone(),
                (config.reconnect_delay, config.max_reconnect_delay),
                Arc::clone(&stats),
            ))
        });

        let local_channel = bus.map(|bus| {
            tokio::spawn(source::bus_source(
                bus.subscribe(STATE_TOPIC),
                match_id.clone(),
                funnel.clone(),
                Arc::clone(&stats),
            ))
        });

        let (timer, poll) = if config.polling {
            let (ticks_tx, ticks_rx) = mpsc::channel(1);
            let timer = tokio::spawn(source::ticker(config.poll_interval, ticks_tx));
            let poll = tokio::spawn(source::poller(
                gateway,
                match_id.clone(),
                config.request_timeout,
                ticks_rx,
                funnel.clone(),
                Arc::clone(&stats),
            ));
            (Some(timer), Some(poll))
        } else {
            (None, None)
        };

        // The dedup loop ends once every source has dropped its sender
        drop(funnel);

        tracing::info!(
            match_id = %match_id,
            relay = config.relay.as_ref().map(|r| r.addr.as_str()).unwrap_or("none"),
            local_bus = bus.is_some(),
            polling = config.polling,
            "Sync agent started"
        );

        let agent = Self {
            match_id,
            stopped,
            stats,
            latest,
            poll,
            relay,
            local_channel,
            timer,
            emitter: Some(emitter),
        };

        (agent, updates)
    }

    /// Match being followed
    pub fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    /// Most recently emitted snapshot
    pub fn latest(&self) -> Option<StateSnapshot> {
        self.latest.borrow().clone()
    }

    /// Watch handle on the most recently emitted snapshot
    pub fn watch_latest(&self) -> watch::Receiver<Option<StateSnapshot>> {
        self.latest.clone()
    }

    /// Current agent counters
    pub fn stats(&self) -> AgentStatsReport {
        self.stats.report()
    }

    /// Whether shutdown has not started yet
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stop every source and close the update channel
    ///
    /// Releases the poll (cancelling any request in flight), the relay
    /// subscription, the local bus subscription and the timer, in that
    /// order. A resource whose task already failed is reported in
    /// [`TeardownReport::failed`] and the rest are still released. Calling
    /// this again returns an empty report.
    pub async fn shutdown(&mut self) -> TeardownReport {
        self.stopped.store(true, Ordering::Release);

        let mut report = TeardownReport::default();
        let resources = [
            (Resource::Poll, self.poll.take()),
            (Resource::RelaySubscription, self.relay.take()),
            (Resource::LocalChannel, self.local_channel.take()),
            (Resource::Timer, self.timer.take()),
        ];

        for (resource, handle) in resources {
            let Some(handle) = handle else {
                continue;
            };

            handle.abort();
            match handle.await {
                Ok(()) => report.released.push(resource),
                Err(e) if e.is_cancelled() => report.released.push(resource),
                Err(e) => {
                    tracing::error!(
                        match_id = %self.match_id,
                        resource = ?resource,
                        error = %e,
                        "Sync agent task failed before teardown"
                    );
                    report.failed.push(resource);
                }
            }
        }

        if let Some(emitter) = self.emitter.take() {
            emitter.abort();
            let _ = emitter.await;
        }

        if !report.is_empty() {
            tracing::info!(
                match_id = %self.match_id,
                released = report.released.len(),
                failed = report.failed.len(),
                "Sync agent stopped"
            );
        }

        report
    }
}

impl Drop for SyncAgent {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);

        let handles = [
            self.poll.take(),
            self.relay.take(),
            self.local_channel.take(),
            self.timer.take(),
            self.emitter.take(),
        ];
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }
    }
}

async fn emit_loop(
    match_id: MatchId,
    mut candidates: mpsc::Receiver<Candidate>,
    output: mpsc::Sender<StateSnapshot>,
    latest: watch::Sender<Option<StateSnapshot>>,
    stopped: Arc<AtomicBool>,
    stats: Arc<AgentStats>,
) {
    let mut filter = DedupFilter::new();

    while let Some(candidate) = candidates.recv().await {
        if stopped.load(Ordering::Acquire) {
            break;
        }

        if !filter.should_emit(&candidate.snapshot) {
            stats.suppressed();
            tracing::trace!(match_id = %match_id, source = ?candidate.source, "Duplicate snapshot suppressed");
            continue;
        }

        stats.emitted();
        tracing::debug!(match_id = %match_id, source = ?candidate.source, "Emitting snapshot");
        latest.send_replace(Some(candidate.snapshot.clone()));

        // A consumer that dropped its receiver can still read latest()
        let _ = output.send(candidate.snapshot).await;
    }
}
