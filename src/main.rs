//! Chat relay server - Entry Point
//!
//! Parses the command line, binds the listener and runs until Ctrl+C.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::config::{DEFAULT_ADDR, DEFAULT_MAX_CLIENTS, DEFAULT_RECV_BUFFER_SIZE};
use chat_relay::{ChatServer, ServerConfig};

#[derive(Parser)]
#[command(name = "chat_relay")]
#[command(about = "Line-oriented TCP chat relay server")]
struct Cli {
    /// Address to listen on
    #[arg(default_value = DEFAULT_ADDR)]
    addr: String,

    /// Maximum number of simultaneously connected clients
    #[arg(long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Receive buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_RECV_BUFFER_SIZE)]
    buffer_size: usize,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            addr: cli.addr,
            max_clients: cli.max_clients,
            recv_buffer_size: cli.buffer_size,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let config = ServerConfig::from(Cli::parse());
    let server = ChatServer::bind(config).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    server.run_until(shutdown).await?;
    info!("Goodbye");

    Ok(())
}
