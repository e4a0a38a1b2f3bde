//! Broadcast engine
//!
//! Best-effort, at-most-once fan-out over a registry snapshot. A failed
//! send to one recipient is logged and dropped; it never stops delivery to
//! the rest and never reaches the caller.

use tracing::debug;

use crate::message::ServerMessage;
use crate::registry::ClientRegistry;
use crate::types::ClientId;

/// Send `payload` to every registered client except `exclude`
///
/// The payload is newline-terminated if it is not already. Returns the
/// number of recipients the write succeeded for.
pub async fn broadcast(
    registry: &ClientRegistry,
    payload: &[u8],
    exclude: Option<ClientId>,
) -> usize {
    let mut line = payload.to_vec();
    if !line.ends_with(b"\n") {
        line.push(b'\n');
    }

    let mut delivered = 0;
    for (handle, name) in registry.snapshot().await {
        if Some(handle.id()) == exclude {
            continue;
        }

        match handle.send(&line).await {
            Ok(()) => delivered += 1,
            Err(e) => debug!("Dropping broadcast to {} ({}): {}", name, handle.addr(), e),
        }
    }

    delivered
}

/// Render `msg` and broadcast it
pub async fn broadcast_message(
    registry: &ClientRegistry,
    msg: &ServerMessage,
    exclude: Option<ClientId>,
) -> usize {
    broadcast(registry, &msg.to_bytes(), exclude).await
}
