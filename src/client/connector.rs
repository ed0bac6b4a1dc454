//! Framed relay connection
//!
//! One TCP connection speaking the relay protocol. The sync agent owns one
//! per instance; nothing is shared between agents.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::protocol::codec::write_frame;
use crate::protocol::{ClientEvent, FrameCodec, FrameReader, ServerEvent};
use crate::snapshot::{MatchId, StateSnapshot};

use super::config::ClientConfig;

/// Connection to a relay server
pub struct RelayConnector {
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    codec: FrameCodec,
    peer_addr: SocketAddr,
}

impl RelayConnector {
    /// Connect to the relay described by `config`
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&config.addr))
            .await
            .map_err(|_| Error::Timeout)??;

        if config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        let peer_addr = stream.peer_addr()?;
        let codec = FrameCodec::new(config.max_frame_size);
        let (read_half, writer) = stream.into_split();

        tracing::debug!(peer = %peer_addr, "Connected to relay");

        Ok(Self {
            reader: FrameReader::new(read_half, codec),
            writer,
            codec,
            peer_addr,
        })
    }

    /// Relay address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send one client event
    pub async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        let frame = self.codec.encode(event)?;
        write_frame(&mut self.writer, &frame).await
    }

    /// Join the room for `match_id`
    pub async fn join(&mut self, match_id: &MatchId) -> Result<()> {
        self.send(&ClientEvent::join(match_id)).await
    }

    /// Leave the current room
    pub async fn leave(&mut self) -> Result<()> {
        self.send(&ClientEvent::Leave).await
    }

    /// Publish a snapshot to the room for `match_id`
    pub async fn publish(&mut self, match_id: &MatchId, snapshot: &StateSnapshot) -> Result<()> {
        self.send(&ClientEvent::publish(match_id, snapshot)).await
    }

    /// Wait for the next pushed snapshot
    ///
    /// A malformed frame comes back as a recoverable error (see
    /// [`Error::is_recoverable`]); the connection stays usable. A closed
    /// connection is [`Error::ConnectionClosed`].
    pub async fn next_update(&mut self) -> Result<StateSnapshot> {
        match self.reader.next::<ServerEvent>().await? {
            Some(ServerEvent::Updated { snapshot }) => Ok(snapshot),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// [`next_update`](Self::next_update) bounded by `timeout`
    pub async fn next_update_timeout(&mut self, timeout: Duration) -> Result<StateSnapshot> {
        tokio::time::timeout(timeout, self.next_update())
            .await
            .map_err(|_| Error::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = RelayConnector::connect(&ClientConfig::new(addr.to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_join_sends_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = FrameReader::new(socket, FrameCodec::default());
            reader.next::<ClientEvent>().await.unwrap()
        });

        let mut connector = RelayConnector::connect(&ClientConfig::new(addr.to_string()))
            .await
            .unwrap();
        assert_eq!(connector.peer_addr(), addr);
        connector.join(&MatchId::from("m9")).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, Some(ClientEvent::join(&MatchId::from("m9"))));
    }

    #[tokio::test]
    async fn test_closed_connection_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut connector = RelayConnector::connect(&ClientConfig::new(addr.to_string()))
            .await
            .unwrap();
        let err = connector.next_update().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed | Error::Io(_)));
    }
}
