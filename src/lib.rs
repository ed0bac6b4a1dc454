//! # matchcast
//!
//! Live match state distribution: a room-scoped relay that fans out state
//! snapshots from a single scoring writer to many viewers, and a client-side
//! sync agent that merges three delivery paths into one deduplicated stream.
//!
//! ```text
//!   writer ──publish──► RelayServer ──updated──► SyncAgent ─┐
//!     │                                                     │
//!     ├──put──► StateGateway ◄──────poll (1s)───── SyncAgent ├─► DedupFilter ─► consumer
//!     │                                                     │
//!     └──publish_state──► LocalBus ──────────────► SyncAgent ┘
//! ```
//!
//! Any single path may fail; the consumer keeps seeing the freshest snapshot
//! reported by whichever path delivers new content first.

pub mod agent;
pub mod bus;
pub mod client;
pub mod dedup;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod snapshot;
pub mod stats;

pub use agent::{AgentConfig, SyncAgent, TeardownReport};
pub use bus::LocalBus;
pub use dedup::DedupFilter;
pub use error::{Error, Result};
pub use gateway::{HttpGateway, MemoryGateway, StateGateway};
pub use registry::RoomRegistry;
pub use server::{RelayServer, ServerConfig};
pub use snapshot::{resolve_match_id, MatchId, StateSnapshot};
