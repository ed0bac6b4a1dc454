//! Relay client implementation
//!
//! Provides client-side connections to a relay server for:
//! - Following a match room (used by the sync agent)
//! - Publishing snapshots as the scoring writer

pub mod config;
pub mod connector;
pub mod publisher;

pub use config::ClientConfig;
pub use connector::RelayConnector;
pub use publisher::{PublishEvent, RelayPublisher};
