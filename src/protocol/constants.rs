//! Protocol constants

/// Default relay port
pub const DEFAULT_RELAY_PORT: u16 = 7400;

/// Size of the frame length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Default upper bound for one frame body (1MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Initial read buffer capacity
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;
