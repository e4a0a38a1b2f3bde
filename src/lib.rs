//! Line-oriented TCP Chat Relay Library
//!
//! A small real-time text relay built on tokio: every client picks a
//! display name, and every line a client sends is rebroadcast to every
//! other connected client.
//!
//! # Features
//! - Username negotiation with an address-based fallback
//! - Timestamped chat relay that never echoes to the sender
//! - Join/leave announcements
//! - `/exit` for a graceful disconnect
//! - Maximum concurrent client ceiling
//! - Graceful shutdown notice
//!
//! # Architecture
//! Task-per-connection over a shared registry:
//! - `ChatServer` accepts connections and spawns one handler task each
//! - `ClientRegistry` is the only shared mutable state, behind one mutex
//! - `broadcast` snapshots the registry and writes to each recipient
//!   without holding the lock
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_relay::AppError> {
//!     let server = ChatServer::bind(ServerConfig::default()).await?;
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use broadcast::{broadcast, broadcast_message};
pub use client::ClientHandle;
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use handler::{handle_connection, serve_client};
pub use message::{Inbound, ServerMessage, EXIT_COMMAND};
pub use registry::ClientRegistry;
pub use server::ChatServer;
pub use types::ClientId;
