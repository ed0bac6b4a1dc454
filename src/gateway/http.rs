//! HTTP gateway
//!
//! Talks to the state endpoint of the scoring web application:
//!
//! ```text
//! GET {base}/api/state?matchId=m1   -> 200 {snapshot} | 200 null | 404
//! PUT {base}/api/state?matchId=m1   <- {snapshot}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::GatewayError;
use crate::snapshot::{MatchId, StateSnapshot};

use super::StateGateway;

const STATE_PATH: &str = "/api/state";

/// Gateway reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    state_url: String,
}

impl HttpGateway {
    /// Create a gateway for the application at `base_url`
    ///
    /// `request_timeout` bounds each request end to end.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a gateway sharing an existing client
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            state_url: format!("{}{}", base_url.trim_end_matches('/'), STATE_PATH),
        }
    }

    /// Endpoint used for both reads and writes
    pub fn state_url(&self) -> &str {
        &self.state_url
    }
}

#[async_trait]
impl StateGateway for HttpGateway {
    async fn get_state(&self, match_id: &MatchId) -> Result<Option<StateSnapshot>, GatewayError> {
        let response = self
            .client
            .get(&self.state_url)
            .query(&[("matchId", match_id.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value: Value = response.json().await?;
                if value.is_null() {
                    return Ok(None);
                }
                Ok(Some(StateSnapshot::from_value(value)?))
            }
            status => Err(GatewayError::Status(status.as_u16())),
        }
    }

    async fn put_state(
        &self,
        match_id: &MatchId,
        snapshot: &StateSnapshot,
    ) -> Result<(), GatewayError> {
        let response = self
            .client
            .put(&self.state_url)
            .query(&[("matchId", match_id.as_str())])
            .json(snapshot)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }
        Ok(())
    }
}
