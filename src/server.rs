//! Listener and accept loop
//!
//! Owns the listening socket and the shared registry. Each accepted
//! connection either gets its own handler task or, when the ceiling has
//! been reached, a capacity notice and an immediate close.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::broadcast::broadcast_message;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::message::ServerMessage;
use crate::registry::ClientRegistry;

/// How long handlers get to wind down before they are aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The relay server
pub struct ChatServer {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    config: ServerConfig,
    /// One task per admitted connection
    handlers: JoinSet<()>,
    /// Flipped to true once the server stops accepting
    shutdown_tx: watch::Sender<bool>,
}

impl ChatServer {
    /// Validate `config` and bind its address
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: config.addr.clone(),
                source,
            })?;

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            listener,
            registry: Arc::new(ClientRegistry::new()),
            config,
            handlers: JoinSet::new(),
            shutdown_tx,
        })
    }

    /// Address actually bound (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared registry of connected clients
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    /// Configuration the server was bound with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Accept connections forever
    ///
    /// Only returns on an accept error, which is fatal.
    pub async fn run(self) -> Result<(), AppError> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Whether the loop ends through `shutdown` or a fatal accept error,
    /// every registered client is told the server is going away, every
    /// handler is wound down, and the registry is empty on return.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Chat relay listening on {} (max {} clients)",
            self.config.addr, self.config.max_clients
        );

        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr).await,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break Err(AppError::Accept(e));
                    }
                },
                Some(joined) = self.handlers.join_next(), if !self.handlers.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection handler panicked: {}", e);
                    }
                }
            }
        };

        self.disconnect_all().await;
        info!("Server closed");
        result
    }

    /// Spawn a handler for `stream`, or turn it away if the server is full
    async fn admit(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.registry.is_full(self.config.max_clients).await {
            warn!("Rejecting {}: server is full", addr);
            reject(stream).await;
            return;
        }

        info!("New connection from {}", addr);

        let registry = Arc::clone(&self.registry);
        let recv_buffer_size = self.config.recv_buffer_size;
        let shutdown = self.shutdown_tx.subscribe();
        self.handlers.spawn(async move {
            if let Err(e) = handle_connection(stream, registry, recv_buffer_size, shutdown).await {
                error!("Connection handler error for {}: {}", addr, e);
            }
        });
    }

    /// Say goodbye, stop every handler and empty the registry
    async fn disconnect_all(&mut self) {
        broadcast_message(&self.registry, &ServerMessage::ShuttingDown, None).await;

        self.shutdown_tx.send_replace(true);

        let handlers = &mut self.handlers;
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while let Some(joined) = handlers.join_next().await {
                if let Err(e) = joined {
                    error!("Connection handler panicked: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Aborting {} stuck connection handlers", self.handlers.len());
            self.handlers.shutdown().await;
        }

        for (handle, name) in self.registry.snapshot().await {
            self.registry.unregister(handle.id()).await;
            if let Err(e) = handle.close().await {
                debug!("Failed to close connection for {}: {}", name, e);
            }
        }
    }
}

/// Send the capacity notice and close
async fn reject(mut stream: TcpStream) {
    let notice = ServerMessage::ServerFull.to_bytes();
    if let Err(e) = stream.write_all(&notice).await {
        debug!("Failed to send capacity notice: {}", e);
    }
    let _ = stream.shutdown().await;
}
