//! Server configuration
//!
//! Fixed at process start; nothing here is mutable at runtime.

use crate::error::AppError;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8888";

/// Default ceiling on simultaneously registered clients
pub const DEFAULT_MAX_CLIENTS: usize = 100;

/// Default size of a single receive, in bytes
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:8888`
    pub addr: String,
    /// Connections beyond this many registered clients are turned away
    pub max_clients: usize,
    /// Upper bound on bytes taken per receive
    pub recv_buffer_size: usize,
}

impl ServerConfig {
    /// Default configuration listening on `addr`
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Reject limits the server cannot run with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_clients == 0 {
            return Err(AppError::InvalidConfig(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(AppError::InvalidConfig(
                "recv_buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            max_clients: DEFAULT_MAX_CLIENTS,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
        }
    }
}
