//! Connection handle definition
//!
//! Represents the write side of one accepted connection. Handles are cheap
//! to clone; clones share the same writer, so the registry and the
//! broadcast engine can reference a connection its handler owns.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ClientId;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to a connected client
///
/// Equality and hashing go through the `ClientId` only.
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    addr: SocketAddr,
    /// Serializes writes so two broadcasts never interleave on one socket
    writer: Arc<Mutex<BoxedWriter>>,
}

impl ClientHandle {
    /// Wrap a writer for the client at `addr` under a fresh ID
    pub fn new<W>(addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: ClientId::new(),
            addr,
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Identity used for registry lookup and broadcast exclusion
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Remote address of the peer
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Write raw bytes to this client and flush
    pub async fn send(&self, bytes: &[u8]) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Render and send a protocol message
    pub async fn send_message(&self, msg: &ServerMessage) -> Result<(), SendError> {
        self.send(&msg.to_bytes()).await
    }

    /// Shut down the write side; the peer observes EOF
    pub async fn close(&self) -> Result<(), SendError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}

impl Hash for ClientHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}
