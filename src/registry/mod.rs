//! Room registry for match-scoped fan-out
//!
//! The registry maps each match id to the set of connections following it
//! and fans published snapshots out to exactly those connections.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<RoomRegistry>
//!                     ┌──────────────────────────┐
//!                     │ rooms: HashMap<MatchId,  │
//!                     │   RoomEntry {            │
//!                     │     members: {id → tx},  │
//!                     │   }                      │
//!                     │ >                        │
//!                     │ membership: {id → room}  │
//!                     └────────────┬─────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//!      [Writer]              [Subscriber]             [Subscriber]
//!   publish event           outbound queue           outbound queue
//!         │                        │                        │
//!         └──► registry.publish() ─┴─► writer task ──► TCP ─┘
//! ```
//!
//! # Zero-Copy Design
//!
//! The `updated` frame is encoded once per publish into `bytes::Bytes`;
//! every member's queue receives a reference-counted handle to the same
//! allocation.

pub mod config;
pub mod entry;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{ConnectionId, Delivery, RoomEntry, RoomStats, Subscriber};
pub use store::{JoinOutcome, RoomRegistry};
