//! Huddle relay binary.
//!
//! # Usage
//!
//! ```bash
//! huddle-server --bind 0.0.0.0:3000
//! huddle-server --bind 0.0.0.0:3000 --ip-connection-cap 16
//! ```

use std::time::Duration;

use clap::Parser;
use huddle_server::{RelayConfig, RelayServer, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Huddle rendezvous relay
#[derive(Parser, Debug)]
#[command(name = "huddle-server")]
#[command(about = "Rendezvous relay for two-party encrypted chat")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Maximum concurrent connections per source address
    #[arg(long, default_value = "8")]
    ip_connection_cap: u32,

    /// Seconds an unoccupied room reservation lives before expiring
    #[arg(long, default_value = "900")]
    pending_room_ttl: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Huddle relay starting");

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        relay: RelayConfig {
            max_connections_per_ip: args.ip_connection_cap,
            pending_room_ttl: Duration::from_secs(args.pending_room_ttl),
        },
    };

    let server = RelayServer::bind(config).await?;

    tracing::info!("Relay listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
