//! Relay server
//!
//! Accepts subscriber and writer connections, routes `join`/`leave` into the
//! room registry and fans `publish` events out to the published room.

pub mod config;
mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
