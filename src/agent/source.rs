//! Snapshot sources
//!
//! Each source runs as its own task and pushes candidates into the agent's
//! funnel channel. None of them decides whether a snapshot is new; that is
//! left to the single dedup loop on the other end of the funnel. A source
//! exits on its own once the funnel is closed.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use super::config::MIN_INTERVAL;
use crate::bus::BusMessage;
use crate::client::{ClientConfig, RelayConnector};
use crate::error::{GatewayError, Result};
use crate::gateway::StateGateway;
use crate::snapshot::{MatchId, StateSnapshot};
use crate::stats::AgentStats;

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    /// Pushed by the relay
    Relay,
    /// Received on the process-local bus
    LocalBus,
    /// Fetched by the polling fallback
    Poll,
}

/// A snapshot on its way to the dedup loop
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) source: Source,
    pub(crate) snapshot: StateSnapshot,
}

pub(crate) type Funnel = mpsc::Sender<Candidate>;

/// Follow the match room on the relay, reconnecting with exponential backoff
pub(crate) async fn relay_source(
    config: ClientConfig,
    match_id: MatchId,
    funnel: Funnel,
    backoff: (Duration, Duration),
    stats: Arc<AgentStats>,
) {
    let (initial, max) = backoff;
    let mut delay = initial;

    loop {
        let mut joined = false;
        let result = follow_room(&config, &match_id, &funnel, &stats, &mut joined).await;

        // A session that got as far as joining resets the backoff
        if joined {
            delay = initial;
        }

        if let Err(e) = result {
            tracing::debug!(
                match_id = %match_id,
                relay = %config.addr,
                error = %e,
                retry_in_ms = delay.as_millis() as u64,
                "Relay subscription unavailable"
            );
        }

        if funnel.is_closed() {
            return;
        }

        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(max);
    }
}

/// One relay session: connect, join, forward pushes until the connection drops
///
/// Returns `Ok(())` only when the funnel has closed.
async fn follow_room(
    config: &ClientConfig,
    match_id: &MatchId,
    funnel: &Funnel,
    stats: &AgentStats,
    joined: &mut bool,
) -> Result<()> {
    let mut connector = RelayConnector::connect(config).await?;
    connector.join(match_id).await?;
    *joined = true;

    tracing::info!(match_id = %match_id, relay = %connector.peer_addr(), "Joined relay room");

    loop {
        match connector.next_update().await {
            Ok(snapshot) => {
                stats.relay_received();
                let candidate = Candidate {
                    source: Source::Relay,
                    snapshot,
                };
                if funnel.send(candidate).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) if e.is_recoverable() => {
                stats.dropped_malformed();
                tracing::debug!(match_id = %match_id, error = %e, "Dropping malformed relay update");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Forward state updates for `match_id` from the local bus
pub(crate) async fn bus_source(
    mut messages: broadcast::Receiver<Value>,
    match_id: MatchId,
    funnel: Funnel,
    stats: Arc<AgentStats>,
) {
    loop {
        let message = match messages.recv().await {
            Ok(message) => message,
            Err(RecvError::Lagged(skipped)) => {
                // Every update is a full snapshot, so skipping ahead loses nothing
                tracing::debug!(match_id = %match_id, skipped = skipped, "Local bus receiver lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let payload = match BusMessage::parse(&message) {
            Ok(Some(BusMessage::StateUpdate {
                match_id: target,
                payload,
            })) if target == match_id => payload,
            Ok(_) => continue,
            Err(e) => {
                stats.dropped_malformed();
                tracing::debug!(match_id = %match_id, error = %e, "Dropping malformed bus message");
                continue;
            }
        };

        match StateSnapshot::from_value(payload) {
            Ok(snapshot) => {
                stats.bus_received();
                let candidate = Candidate {
                    source: Source::LocalBus,
                    snapshot,
                };
                if funnel.send(candidate).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                stats.dropped_malformed();
                tracing::debug!(match_id = %match_id, error = %e, "Dropping malformed bus payload");
            }
        }
    }
}

/// Emit poll ticks at a fixed interval
///
/// The tick channel holds one pending tick. Ticks that fire while a poll is
/// still running and a tick is already pending are dropped, so requests are
/// never stacked up behind a slow gateway.
pub(crate) async fn ticker(period: Duration, ticks: mpsc::Sender<()>) {
    let mut interval = tokio::time::interval(period.max(MIN_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match ticks.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => {
                tracing::trace!("Poll in flight, tick coalesced");
            }
            Err(TrySendError::Closed(())) => return,
        }
    }
}

/// Result of one poll
#[derive(Debug)]
pub(crate) enum PollOutcome {
    Found(StateSnapshot),
    NotFound,
    Failed(GatewayError),
    /// Cut off by the request timeout; not a failure
    TimedOut,
}

pub(crate) async fn poll_once(
    gateway: &dyn StateGateway,
    match_id: &MatchId,
    request_timeout: Duration,
) -> PollOutcome {
    match tokio::time::timeout(request_timeout, gateway.get_state(match_id)).await {
        Ok(Ok(Some(snapshot))) => PollOutcome::Found(snapshot),
        Ok(Ok(None)) => PollOutcome::NotFound,
        Ok(Err(e)) => PollOutcome::Failed(e),
        Err(_) => PollOutcome::TimedOut,
    }
}

/// Issue one gateway request per tick
///
/// Failures never stop the loop; they are counted and logged at trace level.
pub(crate) async fn poller(
    gateway: Arc<dyn StateGateway>,
    match_id: MatchId,
    request_timeout: Duration,
    mut ticks: mpsc::Receiver<()>,
    funnel: Funnel,
    stats: Arc<AgentStats>,
) {
    while ticks.recv().await.is_some() {
        match poll_once(gateway.as_ref(), &match_id, request_timeout).await {
            PollOutcome::Found(snapshot) => {
                stats.poll_found();
                let candidate = Candidate {
                    source: Source::Poll,
                    snapshot,
                };
                if funnel.send(candidate).await.is_err() {
                    return;
                }
            }
            PollOutcome::NotFound => {
                stats.poll_not_found();
                tracing::trace!(match_id = %match_id, "No stored state yet");
            }
            PollOutcome::Failed(e) => {
                stats.poll_failed();
                tracing::trace!(match_id = %match_id, error = %e, "Poll failed");
            }
            PollOutcome::TimedOut => {
                stats.poll_timed_out();
                tracing::trace!(match_id = %match_id, "Poll cancelled at request timeout");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::protocol::codec::write_frame;
    use crate::protocol::{ClientEvent, FrameCodec, FrameReader, ServerEvent};

    struct FailingGateway;

    #[async_trait]
    impl StateGateway for FailingGateway {
        async fn get_state(&self, _: &MatchId) -> std::result::Result<Option<StateSnapshot>, GatewayError> {
            Err(GatewayError::Status(503))
        }

        async fn put_state(&self, _: &MatchId, _: &StateSnapshot) -> std::result::Result<(), GatewayError> {
            Err(GatewayError::Status(503))
        }
    }

    struct StalledGateway;

    #[async_trait]
    impl StateGateway for StalledGateway {
        async fn get_state(&self, _: &MatchId) -> std::result::Result<Option<StateSnapshot>, GatewayError> {
            std::future::pending().await
        }

        async fn put_state(&self, _: &MatchId, _: &StateSnapshot) -> std::result::Result<(), GatewayError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_poll_outcomes() {
        let m1 = MatchId::from("m1");
        let memory = MemoryGateway::new();
        let timeout = Duration::from_secs(1);

        assert!(matches!(poll_once(&memory, &m1, timeout).await, PollOutcome::NotFound));

        let snapshot = StateSnapshot::from_value(json!({"score": "1-0"})).unwrap();
        memory.put_state(&m1, &snapshot).await.unwrap();
        match poll_once(&memory, &m1, timeout).await {
            PollOutcome::Found(found) => assert_eq!(found, snapshot),
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert!(matches!(
            poll_once(&FailingGateway, &m1, timeout).await,
            PollOutcome::Failed(GatewayError::Status(503))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_poll_times_out() {
        let outcome = poll_once(&StalledGateway, &MatchId::from("m1"), Duration::from_millis(300)).await;
        assert!(matches!(outcome, PollOutcome::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_coalesces_while_busy() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(ticker(Duration::from_secs(1), tx));

        // Nobody consumes for several periods: only one tick is held
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        drop(rx);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_zero_period_does_not_panic() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(ticker(Duration::ZERO, tx));

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[tokio::test]
    async fn test_relay_source_rejoins_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let update = StateSnapshot::from_value(json!({"score": "1-0"})).unwrap();
        let pushed = update.clone();

        let relay = tokio::spawn(async move {
            let mut joins = 0;

            // First session: take the join, then hang up
            let (socket, _) = listener.accept().await.unwrap();
            let mut frames = FrameReader::new(socket, FrameCodec::default());
            if let Some(ClientEvent::Join { match_id }) = frames.next::<ClientEvent>().await.unwrap() {
                assert_eq!(match_id.as_str(), "m1");
                joins += 1;
            }
            drop(frames);

            // Second session: take the join and push an update
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut frames = FrameReader::new(read, FrameCodec::default());
            if let Some(ClientEvent::Join { .. }) = frames.next::<ClientEvent>().await.unwrap() {
                joins += 1;
            }
            let frame = FrameCodec::default()
                .encode(&ServerEvent::Updated { snapshot: pushed })
                .unwrap();
            write_frame(&mut write, &frame).await.unwrap();

            (joins, frames, write)
        });

        let (funnel, mut candidates) = mpsc::channel(4);
        let stats = Arc::new(AgentStats::new());
        let source = tokio::spawn(relay_source(
            ClientConfig::new(addr.to_string()),
            MatchId::from("m1"),
            funnel,
            (Duration::from_millis(20), Duration::from_millis(50)),
            stats.clone(),
        ));

        let candidate = tokio::time::timeout(Duration::from_secs(5), candidates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(candidate.source, Source::Relay);
        assert_eq!(candidate.snapshot, update);
        assert_eq!(stats.report().relay_received, 1);

        let (joins, _frames, _write) = relay.await.unwrap();
        assert_eq!(joins, 2);

        source.abort();
    }

    #[tokio::test]
    async fn test_bus_source_filters() {
        let (bus_tx, bus_rx) = broadcast::channel(16);
        let (funnel, mut candidates) = mpsc::channel(16);
        let stats = Arc::new(AgentStats::new());
        tokio::spawn(bus_source(bus_rx, MatchId::from("m1"), funnel, stats.clone()));

        bus_tx.send(json!({"kind": "chat", "text": "hello"})).unwrap();
        bus_tx
            .send(json!({"kind": "state-update", "matchId": "m2", "payload": {"score": "9-9"}}))
            .unwrap();
        bus_tx
            .send(json!({"kind": "state-update", "matchId": "m1", "payload": "not an object"}))
            .unwrap();
        bus_tx
            .send(json!({"kind": "state-update", "matchId": "m1", "payload": {"score": "1-0"}}))
            .unwrap();

        let candidate = candidates.recv().await.unwrap();
        assert_eq!(candidate.source, Source::LocalBus);
        assert_eq!(candidate.snapshot.get("score"), Some(&json!("1-0")));

        let report = stats.report();
        assert_eq!(report.bus_received, 1);
        assert_eq!(report.dropped_malformed, 1);
    }
}
