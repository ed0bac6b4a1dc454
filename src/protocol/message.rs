//! Relay events
//!
//! Events are adjacently tagged: `{"event": "<name>", "data": {...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::{MatchId, StateSnapshot};

/// Events sent by clients (subscribers and the writer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientEvent {
    /// Become a member of a match room, leaving any previous room
    Join {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },

    /// Fan a snapshot out to the room's members
    ///
    /// The snapshot stays raw here so a bad payload can be rejected and
    /// logged by the server without losing the connection.
    Publish {
        #[serde(rename = "matchId")]
        match_id: MatchId,
        snapshot: Value,
    },

    /// Leave the current room
    Leave,
}

impl ClientEvent {
    /// Join event for `match_id`
    pub fn join(match_id: &MatchId) -> Self {
        ClientEvent::Join {
            match_id: match_id.clone(),
        }
    }

    /// Publish event carrying `snapshot`
    pub fn publish(match_id: &MatchId, snapshot: &StateSnapshot) -> Self {
        ClientEvent::Publish {
            match_id: match_id.clone(),
            snapshot: snapshot.value().clone(),
        }
    }
}

/// Events sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// New state for the room the receiver belongs to
    Updated { snapshot: StateSnapshot },
}
