//! Relay and agent statistics

pub mod metrics;

pub use metrics::{AgentStats, AgentStatsReport, RelayStats, ServerStats};
