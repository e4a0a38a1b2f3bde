//! Error types for the relay server
//!
//! Defines application-level errors and per-recipient send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Accept and bind failures are fatal to the listener. Everything that
/// happens inside one connection stays inside that connection's handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// Could not bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// accept() failed (fatal - terminates the listener)
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// IO error on a single connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing to a client failed
    #[error(transparent)]
    Send(#[from] SendError),

    /// Rejected server configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Message send errors
///
/// Occurs when writing to a single recipient fails, typically because the
/// peer has gone away.
#[derive(Debug, Error)]
pub enum SendError {
    /// The underlying write or flush failed
    #[error("send failed: {0}")]
    Io(#[from] std::io::Error),
}
