//! Relay server demo
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:7400
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:7400
//!   cargo run --example relay_server 127.0.0.1:7401     # binds to 127.0.0.1:7401
//!
//! Point `scoreboard_viewer` at the same address to watch a match.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use matchcast::protocol::constants::DEFAULT_RELAY_PORT;
use matchcast::{RelayServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts "localhost", "localhost:PORT", "IP" and "IP:PORT".
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_RELAY_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_RELAY_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(arg) = args.get(1) {
        match parse_bind_addr(arg) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("matchcast=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    println!("Starting relay on {}", config.bind_addr);

    let server = Arc::new(RelayServer::new(config));

    // Periodic stats line
    let reporter = Arc::clone(&server);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        interval.tick().await;
        loop {
            interval.tick().await;
            let stats = reporter.stats().await;
            println!(
                "Stats: rooms={} connections={} publishes={} deliveries={} dropped={}",
                stats.active_rooms,
                stats.active_connections,
                stats.publishes,
                stats.deliveries,
                stats.dropped_deliveries,
            );
        }
    });

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
