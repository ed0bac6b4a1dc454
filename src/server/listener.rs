//! Relay server listener
//!
//! Handles TCP accept loop and spawns connection handlers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::registry::{RegistryConfig, RoomRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::stats::{RelayStats, ServerStats};

/// Match state relay server
///
/// Holds no durable state: a restart drops all room membership and
/// subscribers are expected to rejoin.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
    stats: Arc<RelayStats>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let registry_config = registry_config.max_frame_size(config.max_frame_size);
        let stats = Arc::new(RelayStats::new());

        Self {
            config,
            registry: Arc::new(RoomRegistry::with_stats(registry_config, Arc::clone(&stats))),
            stats,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Current server statistics
    pub async fn stats(&self) -> ServerStats {
        self.stats.report(self.registry.room_count().await)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        // Spawn cleanup task for the room registry
        let cleanup_handle = self.registry.spawn_cleanup_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Stop cleanup task on shutdown
        cleanup_handle.abort();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);
        let stats = Arc::clone(&self.stats);

        tokio::spawn(async move {
            let _permit = permit;
            stats.connection_opened();

            let connection = Connection::new(connection_id, socket, peer_addr, config, registry);
            if let Err(e) = connection.run().await {
                tracing::debug!(
                    connection_id = connection_id,
                    error = %e,
                    "Connection error"
                );
            }

            stats.connection_closed();
            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
