//! In-process gateway

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::GatewayError;
use crate::snapshot::{MatchId, StateSnapshot};

use super::StateGateway;

/// Gateway backed by a process-local map
///
/// Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    states: Arc<RwLock<HashMap<MatchId, StateSnapshot>>>,
}

impl MemoryGateway {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the stored snapshot for `match_id`
    pub fn remove(&self, match_id: &MatchId) -> Option<StateSnapshot> {
        self.states.write().remove(match_id)
    }

    /// Number of matches with a stored snapshot
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl StateGateway for MemoryGateway {
    async fn get_state(&self, match_id: &MatchId) -> Result<Option<StateSnapshot>, GatewayError> {
        Ok(self.states.read().get(match_id).cloned())
    }

    async fn put_state(
        &self,
        match_id: &MatchId,
        snapshot: &StateSnapshot,
    ) -> Result<(), GatewayError> {
        self.states.write().insert(match_id.clone(), snapshot.clone());
        Ok(())
    }
}
