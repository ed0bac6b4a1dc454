//! Per-connection handling
//!
//! Each connection runs a reader loop for client events and a separate
//! writer task that drains the connection's outbound queue onto the socket.
//! Publishes only ever touch the queue, so a stalled socket delays nobody
//! but its own connection.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::codec::write_frame;
use crate::protocol::{ClientEvent, FrameCodec, FrameReader};
use crate::registry::{ConnectionId, RoomRegistry, Subscriber};
use crate::server::config::ServerConfig;
use crate::snapshot::StateSnapshot;

/// One relay connection
pub(crate) struct Connection<S> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    socket: S,
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(crate) fn new(
        id: ConnectionId,
        socket: S,
        peer_addr: SocketAddr,
        config: ServerConfig,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        Self {
            id,
            peer_addr,
            socket,
            config,
            registry,
        }
    }

    /// Serve the connection until the peer disconnects or output fails
    ///
    /// A writer that gives up (write error or stall past `write_timeout`)
    /// ends the whole connection, so the peer sees the socket close and can
    /// reconnect. Leaving the room on the way out is unconditional.
    pub(crate) async fn run(self) -> Result<()> {
        let (reader, writer) = tokio::io::split(self.socket);
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_capacity.max(1));
        let mut writer_task = spawn_writer(self.id, writer, rx, &self.config);
        let subscriber = Subscriber::new(self.id, tx);

        tracing::debug!(connection_id = self.id, peer = %self.peer_addr, "Connection ready");

        let codec = FrameCodec::new(self.config.max_frame_size);
        let mut frames = FrameReader::with_capacity(reader, codec, self.config.read_buffer_size);
        let result = tokio::select! {
            result = read_loop(self.id, &mut frames, &subscriber, &self.registry) => result,
            output = &mut writer_task => match output {
                Ok(result) => result,
                Err(_) => Ok(()),
            },
        };

        self.registry.leave(self.id).await;
        drop(subscriber);
        writer_task.abort();

        result
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    id: ConnectionId,
    frames: &mut FrameReader<R>,
    subscriber: &Subscriber,
    registry: &RoomRegistry,
) -> Result<()> {
    loop {
        match frames.next::<ClientEvent>().await {
            Ok(Some(event)) => handle_event(id, event, subscriber, registry).await,
            Ok(None) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(connection_id = id, error = %e, "Dropping malformed frame");
            }
            Err(e) => return Err(e),
        }
    }
}

async fn handle_event(
    id: ConnectionId,
    event: ClientEvent,
    subscriber: &Subscriber,
    registry: &RoomRegistry,
) {
    match event {
        ClientEvent::Join { match_id } => {
            registry.join(subscriber.clone(), &match_id).await;
        }
        ClientEvent::Leave => {
            registry.leave(id).await;
        }
        ClientEvent::Publish { match_id, snapshot } => {
            match StateSnapshot::from_value(snapshot) {
                Ok(snapshot) => {
                    registry.publish(&match_id, &snapshot).await;
                }
                Err(e) => {
                    registry.stats().publish_rejected();
                    tracing::warn!(
                        connection_id = id,
                        match_id = %match_id,
                        error = %e,
                        "Rejected publish with malformed snapshot"
                    );
                }
            }
        }
    }
}

fn spawn_writer<W>(
    id: ConnectionId,
    mut writer: W,
    mut rx: mpsc::Receiver<Bytes>,
    config: &ServerConfig,
) -> JoinHandle<Result<()>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let write_timeout = config.write_timeout;

    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match tokio::time::timeout(write_timeout, write_frame(&mut writer, &frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(connection_id = id, error = %e, "Write failed");
                    return Err(e);
                }
                Err(_) => {
                    tracing::warn!(connection_id = id, "Write stalled, closing connection");
                    return Err(Error::Timeout);
                }
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::protocol::ServerEvent;
    use crate::snapshot::MatchId;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    fn encode(event: &ClientEvent) -> Bytes {
        FrameCodec::default().encode(event).unwrap()
    }

    #[tokio::test]
    async fn test_join_then_disconnect_leaves_room() {
        let registry = Arc::new(RoomRegistry::new());
        let (client, server) = tokio::io::duplex(4096);
        let connection = Connection::new(1, server, addr(), ServerConfig::default(), registry.clone());
        let task = tokio::spawn(connection.run());

        let (client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(&encode(&ClientEvent::join(&MatchId::from("m1"))))
            .await
            .unwrap();

        // Wait for the join to land
        for _ in 0..50 {
            if registry.room_of(1).await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(registry.room_of(1).await, Some(MatchId::from("m1")));

        drop(client_write);
        drop(client_read);
        task.await.unwrap().unwrap();
        assert_eq!(registry.room_of(1).await, None);
    }

    #[tokio::test]
    async fn test_stalled_output_closes_connection() {
        let registry = Arc::new(RoomRegistry::new());
        let (client, server) = tokio::io::duplex(64);
        let config = ServerConfig::default().write_timeout(Duration::from_millis(100));
        let connection = Connection::new(1, server, addr(), config, registry.clone());
        let task = tokio::spawn(connection.run());

        let (mut client_read, mut client_write) = tokio::io::split(client);
        let m1 = MatchId::from("m1");
        client_write.write_all(&encode(&ClientEvent::join(&m1))).await.unwrap();

        for _ in 0..50 {
            if registry.room_of(1).await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // The client never reads, so a frame bigger than the pipe stalls the writer
        let big = StateSnapshot::from_value(json!({"log": "x".repeat(256)})).unwrap();
        assert_eq!(registry.publish(&m1, &big).await, 1);

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("connection should end after a stalled write")
            .unwrap();
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(registry.room_of(1).await, None);

        // The peer sees the stream end after the partial frame
        let mut received = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), client_read.read_to_end(&mut received))
            .await
            .unwrap();
        assert!(read.is_ok());
        assert_eq!(received.len(), 64);
    }

    #[tokio::test]
    async fn test_zero_queue_capacity_is_usable() {
        let registry = Arc::new(RoomRegistry::new());
        let (client, server) = tokio::io::duplex(4096);
        let mut config = ServerConfig::default();
        config.outbound_queue_capacity = 0;
        let connection = Connection::new(7, server, addr(), config, registry.clone());
        tokio::spawn(connection.run());

        let (client_read, mut client_write) = tokio::io::split(client);
        let m1 = MatchId::from("m1");
        client_write.write_all(&encode(&ClientEvent::join(&m1))).await.unwrap();

        for _ in 0..50 {
            if registry.room_of(7).await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let snapshot = StateSnapshot::from_value(json!({"score": "0-0"})).unwrap();
        assert_eq!(registry.publish(&m1, &snapshot).await, 1);

        let mut frames = FrameReader::new(client_read, FrameCodec::default());
        let event = tokio::time::timeout(Duration::from_secs(1), frames.next::<ServerEvent>())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, Some(ServerEvent::Updated { snapshot }));
    }

    #[tokio::test]
    async fn test_malformed_publish_keeps_connection() {
        let registry = Arc::new(RoomRegistry::new());
        let (client, server) = tokio::io::duplex(4096);
        let connection = Connection::new(1, server, addr(), ServerConfig::default(), registry.clone());
        tokio::spawn(connection.run());

        let (client_read, mut client_write) = tokio::io::split(client);
        let m1 = MatchId::from("m1");

        let bad = ClientEvent::Publish {
            match_id: m1.clone(),
            snapshot: json!("not an object"),
        };
        let mut garbage = bytes::BytesMut::new();
        bytes::BufMut::put_u32(&mut garbage, 3);
        bytes::BufMut::put_slice(&mut garbage, b"???");

        client_write.write_all(&garbage).await.unwrap();
        client_write.write_all(&encode(&bad)).await.unwrap();
        client_write.write_all(&encode(&ClientEvent::join(&m1))).await.unwrap();

        let good = StateSnapshot::from_value(json!({"score": "1-0"})).unwrap();
        let mut frames = FrameReader::new(client_read, FrameCodec::default());

        // Publish until our own join has been processed and the update comes back
        let received = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                client_write
                    .write_all(&encode(&ClientEvent::publish(&m1, &good)))
                    .await
                    .unwrap();
                if let Ok(Ok(Some(event))) =
                    tokio::time::timeout(Duration::from_millis(50), frames.next::<ServerEvent>()).await
                {
                    return event;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(received, ServerEvent::Updated { snapshot: good });
        assert_eq!(registry.stats().report(0).rejected_publishes, 1);
    }
}
