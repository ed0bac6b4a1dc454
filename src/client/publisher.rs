//! Relay snapshot publisher
//!
//! High-level API for the scoring writer to push snapshots through a relay.

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::snapshot::{MatchId, StateSnapshot};

use super::config::ClientConfig;
use super::connector::RelayConnector;

/// Events from the relay publisher
#[derive(Debug)]
pub enum PublishEvent {
    /// Connected and ready to publish
    Connected,

    /// Error occurred; the connection was dropped
    Error(String),

    /// Disconnected
    Disconnected,
}

/// Relay snapshot publisher
///
/// Publishing is best-effort: the relay sends no acknowledgement. A failed
/// write drops the connection and reports [`PublishEvent::Error`]; call
/// [`connect`](Self::connect) again to resume.
///
/// # Example
/// ```no_run
/// use matchcast::client::{ClientConfig, RelayPublisher};
/// use matchcast::snapshot::{MatchId, StateSnapshot};
///
/// # async fn example() -> matchcast::error::Result<()> {
/// let config = ClientConfig::new("127.0.0.1:7400");
/// let (mut publisher, mut events) = RelayPublisher::new(config);
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         tracing::info!(?event, "publisher event");
///     }
/// });
///
/// publisher.connect().await?;
/// let snapshot = StateSnapshot::from_value(serde_json::json!({"score": "1-0"}))?;
/// publisher.publish(&MatchId::from("m1"), &snapshot).await?;
/// # Ok(())
/// # }
/// ```
pub struct RelayPublisher {
    config: ClientConfig,
    event_tx: mpsc::Sender<PublishEvent>,
    connector: Option<RelayConnector>,
}

impl RelayPublisher {
    /// Create a new publisher.
    ///
    /// Returns the publisher and a receiver for events. Events are dropped
    /// rather than queued without bound if the receiver is not drained.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<PublishEvent>) {
        let (tx, rx) = mpsc::channel(64);

        let publisher = Self {
            config,
            event_tx: tx,
            connector: None,
        };

        (publisher, rx)
    }

    /// Connect to the relay server.
    pub async fn connect(&mut self) -> Result<()> {
        let connector = RelayConnector::connect(&self.config).await?;
        self.connector = Some(connector);
        self.notify(PublishEvent::Connected);
        Ok(())
    }

    /// Publish a full snapshot to the room for `match_id`.
    pub async fn publish(&mut self, match_id: &MatchId, snapshot: &StateSnapshot) -> Result<()> {
        let connector = self.connector.as_mut().ok_or(Error::NotConnected)?;

        if let Err(e) = connector.publish(match_id, snapshot).await {
            tracing::warn!(match_id = %match_id, error = %e, "Publish failed, dropping connection");
            self.connector = None;
            self.notify(PublishEvent::Error(e.to_string()));
            return Err(e);
        }

        Ok(())
    }

    /// Disconnect from the server.
    pub fn disconnect(&mut self) {
        if self.connector.take().is_some() {
            self.notify(PublishEvent::Disconnected);
        }
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.connector.is_some()
    }

    fn notify(&self, event: PublishEvent) {
        let _ = self.event_tx.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::protocol::{ClientEvent, FrameCodec, FrameReader};

    #[tokio::test]
    async fn test_publish_requires_connection() {
        let (mut publisher, _events) = RelayPublisher::new(ClientConfig::new("127.0.0.1:1"));
        let snapshot = StateSnapshot::from_value(json!({"score": "0-0"})).unwrap();

        let err = publisher
            .publish(&MatchId::from("m1"), &snapshot)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(!publisher.is_connected());
    }

    #[tokio::test]
    async fn test_publish_and_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = FrameReader::new(socket, FrameCodec::default());
            reader.next::<ClientEvent>().await.unwrap()
        });

        let (mut publisher, mut events) = RelayPublisher::new(ClientConfig::new(addr.to_string()));
        publisher.connect().await.unwrap();
        assert!(matches!(events.recv().await, Some(PublishEvent::Connected)));

        let snapshot = StateSnapshot::from_value(json!({"score": "1-0"})).unwrap();
        publisher.publish(&MatchId::from("m1"), &snapshot).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(
            received,
            Some(ClientEvent::publish(&MatchId::from("m1"), &snapshot))
        );

        publisher.disconnect();
        assert!(matches!(events.recv().await, Some(PublishEvent::Disconnected)));
        assert!(!publisher.is_connected());
    }
}
