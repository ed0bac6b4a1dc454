//! State persistence gateway
//!
//! The gateway is the store of record for the last full snapshot of each
//! match. The writer puts into it; the sync agent's polling fallback reads
//! from it. "No snapshot yet" is a normal answer (`Ok(None)`), not an error.

mod http;
mod memory;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::snapshot::{MatchId, StateSnapshot};

/// Request/response access to stored match snapshots
#[async_trait]
pub trait StateGateway: Send + Sync {
    /// Fetch the stored snapshot for `match_id`, or `None` if there is none
    async fn get_state(&self, match_id: &MatchId) -> Result<Option<StateSnapshot>, GatewayError>;

    /// Replace the stored snapshot for `match_id`
    async fn put_state(
        &self,
        match_id: &MatchId,
        snapshot: &StateSnapshot,
    ) -> Result<(), GatewayError>;
}
