//! Connection handler
//!
//! Drives one connection through its lifecycle:
//! prompt → name negotiation → receive loop → cleanup.
//! One handler runs per accepted connection, concurrently with all others.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broadcast::broadcast_message;
use crate::client::ClientHandle;
use crate::error::AppError;
use crate::message::{Inbound, ServerMessage};
use crate::registry::ClientRegistry;

/// Why the receive loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    /// EOF, read error or `/exit`
    ClientLeft,
    /// The server is stopping
    ServerShutdown,
}

/// Handle a new TCP connection
///
/// Splits the stream, wraps the write half in a [`ClientHandle`] and runs
/// the session to completion.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<ClientRegistry>,
    recv_buffer_size: usize,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let peer_addr = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();
    let handle = ClientHandle::new(peer_addr, writer);

    debug!("Client {} connected from {}", handle.id(), peer_addr);

    serve_client(reader, handle, &registry, recv_buffer_size, shutdown).await
}

/// Run a session over an arbitrary reader/handle pair
///
/// Receive failures and EOF are treated as a disconnect, not as errors.
/// Only a failure to write the prompt or the welcome is returned.
///
/// The session ends early once `shutdown` turns true (or its sender is
/// dropped). In that case the client is unregistered and closed without a
/// leave announcement; the server has already said goodbye to everyone.
pub async fn serve_client<R>(
    mut reader: R,
    handle: ClientHandle,
    registry: &ClientRegistry,
    recv_buffer_size: usize,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; recv_buffer_size.max(1)];

    handle.send_message(&ServerMessage::UsernamePrompt).await?;

    let name = tokio::select! {
        name = negotiate(&mut reader, &handle, &mut buf) => name,
        _ = shutdown.wait_for(|stop| *stop) => None,
    };
    let Some(name) = name else {
        debug!("Client {} left before choosing a name", handle.addr());
        let _ = handle.close().await;
        return Ok(());
    };

    if !registry.register(handle.clone(), name.clone()).await {
        warn!("Client {} was already registered, continuing", handle.id());
    }

    let welcome = ServerMessage::Welcome {
        username: name.clone(),
    };
    if let Err(e) = handle.send_message(&welcome).await {
        registry.unregister(handle.id()).await;
        let _ = handle.close().await;
        return Err(e.into());
    }

    info!("{} has joined the chat", name);
    broadcast_message(
        registry,
        &ServerMessage::Joined {
            username: name.clone(),
        },
        Some(handle.id()),
    )
    .await;

    let departure = receive_loop(
        &mut reader,
        &handle,
        registry,
        &name,
        &mut buf,
        &mut shutdown,
    )
    .await;

    registry.unregister(handle.id()).await;
    if departure == Departure::ClientLeft {
        broadcast_message(
            registry,
            &ServerMessage::Left {
                username: name.clone(),
            },
            None,
        )
        .await;
        info!("{} has left the chat", name);
    } else {
        debug!("Closing {} for shutdown", name);
    }

    let _ = handle.close().await;
    Ok(())
}

/// Wait for the display name
///
/// Returns None if the peer closes or errors before sending anything.
async fn negotiate<R>(reader: &mut R, handle: &ClientHandle, buf: &mut [u8]) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let n = match reader.read(buf).await {
        Ok(0) => return None,
        Ok(n) => n,
        Err(e) => {
            debug!("Read error from {} during negotiation: {}", handle.addr(), e);
            return None;
        }
    };

    let name = String::from_utf8_lossy(&buf[..n]).trim().to_string();
    if name.is_empty() {
        Some(fallback_name(handle.addr()))
    } else {
        Some(name)
    }
}

/// Relay chat lines until the client leaves or the server stops
async fn receive_loop<R>(
    reader: &mut R,
    handle: &ClientHandle,
    registry: &ClientRegistry,
    name: &str,
    buf: &mut [u8],
    shutdown: &mut watch::Receiver<bool>,
) -> Departure
where
    R: AsyncRead + Unpin,
{
    loop {
        let read = tokio::select! {
            read = reader.read(buf) => read,
            _ = shutdown.wait_for(|stop| *stop) => return Departure::ServerShutdown,
        };

        let n = match read {
            Ok(0) => {
                debug!("{} closed the connection", name);
                return Departure::ClientLeft;
            }
            Ok(n) => n,
            Err(e) => {
                debug!("Read error from {}: {}", name, e);
                return Departure::ClientLeft;
            }
        };

        match Inbound::parse(&buf[..n]) {
            Inbound::Exit => {
                debug!("{} sent the exit command", name);
                return Departure::ClientLeft;
            }
            Inbound::Empty => {}
            Inbound::Text(content) => {
                let msg = ServerMessage::chat(name, content);
                info!("{}", msg.to_string().trim_end());
                broadcast_message(registry, &msg, Some(handle.id())).await;
            }
        }
    }
}

/// Name assigned when the client sends a blank one
pub fn fallback_name(addr: SocketAddr) -> String {
    format!("User-{}", addr.ip())
}
