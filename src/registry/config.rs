//! Registry configuration

use std::time::Duration;

/// Room registry settings
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an empty room is kept before cleanup reclaims it
    pub idle_room_timeout: Duration,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,

    /// Frame limit used when encoding `updated` events
    pub max_frame_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_room_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(30),
            max_frame_size: crate::protocol::constants::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl RegistryConfig {
    /// Set the idle room timeout
    pub fn idle_room_timeout(mut self, timeout: Duration) -> Self {
        self.idle_room_timeout = timeout;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the frame limit
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.idle_room_timeout, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .idle_room_timeout(Duration::from_secs(1))
            .cleanup_interval(Duration::from_millis(250))
            .max_frame_size(4096);

        assert_eq!(config.idle_room_timeout, Duration::from_secs(1));
        assert_eq!(config.cleanup_interval, Duration::from_millis(250));
        assert_eq!(config.max_frame_size, 4096);
    }

    #[test]
    fn test_zero_cleanup_interval_clamped() {
        let config = RegistryConfig::default().cleanup_interval(Duration::ZERO);
        assert_eq!(config.cleanup_interval, Duration::from_millis(1));
    }
}
