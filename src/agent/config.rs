//! Agent configuration

use std::time::Duration;

use crate::client::ClientConfig;
use crate::snapshot::{resolve_match_id, MatchId};

/// Shortest timer period accepted; `tokio::time::interval` rejects zero
pub(crate) const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Sync agent settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Match to follow
    pub match_id: MatchId,

    /// Relay to subscribe to (None disables the push path)
    pub relay: Option<ClientConfig>,

    /// Whether to run the polling fallback
    pub polling: bool,

    /// Time between poll ticks
    pub poll_interval: Duration,

    /// A poll still unanswered after this long is cancelled
    pub request_timeout: Duration,

    /// First delay before reconnecting to the relay
    pub reconnect_delay: Duration,

    /// Reconnect delay ceiling
    pub max_reconnect_delay: Duration,

    /// Candidates buffered between the sources and the dedup loop
    pub funnel_capacity: usize,

    /// Emissions buffered for the consumer
    pub output_capacity: usize,
}

impl AgentConfig {
    /// Follow `match_id` with default settings
    pub fn new(match_id: MatchId) -> Self {
        Self {
            match_id,
            relay: None,
            polling: true,
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(1),
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            funnel_capacity: 64,
            output_capacity: 16,
        }
    }

    /// Follow the match picked by [`resolve_match_id`]
    pub fn resolve(explicit: Option<&str>, ambient: Option<&str>) -> Self {
        Self::new(resolve_match_id(explicit, ambient))
    }

    /// Subscribe to the relay described by `relay`
    pub fn relay(mut self, relay: ClientConfig) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Subscribe to the relay at `addr` with default client settings
    pub fn relay_addr(self, addr: impl Into<String>) -> Self {
        self.relay(ClientConfig::new(addr))
    }

    /// Disable the polling fallback
    pub fn disable_polling(mut self) -> Self {
        self.polling = false;
        self
    }

    /// Set the poll interval (at least 1ms)
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Set the per-request poll timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set relay reconnect backoff bounds
    pub fn reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_delay = initial;
        self.max_reconnect_delay = max.max(initial);
        self
    }

    /// Set the consumer-side buffer (at least 1)
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity.max(1);
        self
    }
}
