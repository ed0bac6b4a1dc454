//! Scoreboard viewer demo
//!
//! Run with: cargo run --example scoreboard_viewer [RELAY_ADDR] [MATCH_ID] [STATE_URL]
//!
//! Examples:
//!   cargo run --example scoreboard_viewer
//!   cargo run --example scoreboard_viewer 127.0.0.1:7400 m1
//!   cargo run --example scoreboard_viewer 127.0.0.1:7400 m1 http://localhost:3000
//!
//! Without MATCH_ID the `MATCH_ID` environment variable is used, then
//! "default". Without STATE_URL the polling fallback is off.

use std::sync::Arc;
use std::time::Duration;

use matchcast::gateway::StateGateway;
use matchcast::{AgentConfig, HttpGateway, MemoryGateway, SyncAgent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: scoreboard_viewer [RELAY_ADDR] [MATCH_ID] [STATE_URL]");
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("matchcast=info".parse()?)
                .add_directive("scoreboard_viewer=debug".parse()?),
        )
        .init();

    let relay_addr = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1:7400".to_string());
    let ambient = std::env::var("MATCH_ID").ok();
    let mut config =
        AgentConfig::resolve(args.get(2).map(String::as_str), ambient.as_deref()).relay_addr(relay_addr);

    let gateway: Arc<dyn StateGateway> = match args.get(3) {
        Some(url) => Arc::new(HttpGateway::new(url, Duration::from_secs(1))?),
        None => {
            config = config.disable_polling();
            Arc::new(MemoryGateway::new())
        }
    };

    println!("Watching match '{}'", config.match_id);

    let (mut agent, mut updates) = SyncAgent::start(config, gateway, None);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(snapshot) => println!("{}", snapshot.value()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    let report = agent.shutdown().await;
    let stats = agent.stats();
    println!(
        "Released {:?}; emitted={} suppressed={} polls={}",
        report.released,
        stats.emitted,
        stats.suppressed,
        stats.polls(),
    );

    Ok(())
}
