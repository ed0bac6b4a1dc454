//! Client configuration

use std::time::Duration;

use crate::protocol::constants::DEFAULT_MAX_FRAME_SIZE;

/// Relay client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay address (`host:port`)
    pub addr: String,

    /// Give up connecting after this long
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Maximum accepted frame body size
    pub max_frame_size: usize,
}

impl ClientConfig {
    /// Create a config for the relay at `addr`
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            tcp_nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config() {
        let config = ClientConfig::new("relay.local:7400");

        assert_eq!(config.addr, "relay.local:7400");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("127.0.0.1:7400")
            .connect_timeout(Duration::from_millis(250))
            .max_frame_size(2048);

        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.max_frame_size, 2048);
    }
}
