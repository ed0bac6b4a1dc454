//! Process-local publish/subscribe channel
//!
//! When the writer and its viewers share a process, state updates can skip
//! the network entirely. The bus fans raw JSON messages out per topic using
//! `tokio::sync::broadcast`; state updates travel on [`STATE_TOPIC`] as
//! tagged objects:
//!
//! ```text
//! { "kind": "state-update", "matchId": "m1", "payload": { ... } }
//! ```
//!
//! Messages stay raw on the bus so that other kinds of traffic can share a
//! topic; receivers pick out what they understand with [`BusMessage::parse`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::snapshot::{MatchId, StateSnapshot};

/// Topic carrying match state updates
pub const STATE_TOPIC: &str = "match-state";

/// `kind` tag of a state update
pub const STATE_UPDATE_KIND: &str = "state-update";

const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// Messages this crate understands on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BusMessage {
    /// Full state of one match
    StateUpdate {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        payload: Value,
    },
}

impl BusMessage {
    /// Build a state update message
    pub fn state_update(match_id: &MatchId, snapshot: &StateSnapshot) -> Self {
        BusMessage::StateUpdate {
            match_id: match_id.clone(),
            payload: snapshot.value().clone(),
        }
    }

    /// Interpret a raw bus message
    ///
    /// Messages of another kind yield `Ok(None)`; a message tagged as a
    /// state update that does not have the expected shape is an error.
    pub fn parse(message: &Value) -> Result<Option<Self>, serde_json::Error> {
        if message.get("kind").and_then(Value::as_str) != Some(STATE_UPDATE_KIND) {
            return Ok(None);
        }
        serde_json::from_value(message.clone()).map(Some)
    }

    /// Encode as a raw bus message
    pub fn to_value(&self) -> Value {
        match self {
            BusMessage::StateUpdate { match_id, payload } => serde_json::json!({
                "kind": STATE_UPDATE_KIND,
                "matchId": match_id,
                "payload": payload,
            }),
        }
    }
}

/// Process-local fan-out channel keyed by topic name
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct LocalBus {
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<Value>>>>,
    capacity: usize,
}

impl LocalBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a bus whose topics buffer `capacity` messages per receiver
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to `topic`, creating it if needed
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value> {
        if let Some(tx) = self.topics.read().get(topic) {
            return tx.subscribe();
        }

        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Send a raw message to every current subscriber of `topic`
    ///
    /// Returns the number of subscribers reached. A topic with nobody
    /// listening silently drops the message.
    pub fn publish(&self, topic: &str, message: Value) -> usize {
        self.topics
            .read()
            .get(topic)
            .and_then(|tx| tx.send(message).ok())
            .unwrap_or(0)
    }

    /// Publish a state update for `match_id` on [`STATE_TOPIC`]
    pub fn publish_state(&self, match_id: &MatchId, snapshot: &StateSnapshot) -> usize {
        let message = BusMessage::state_update(match_id, snapshot).to_value();
        let reached = self.publish(STATE_TOPIC, message);

        tracing::trace!(match_id = %match_id, reached = reached, "State published on local bus");
        reached
    }

    /// Number of live receivers on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}
