//! Listener configuration
//!
//! These limits are the only backpressure the endpoint applies: a client
//! that is slow to send headers, or a request that takes too long to handle,
//! has its connection dropped.

use std::time::Duration;

use crate::error::ConfigError;

/// Smallest header buffer the HTTP/1 connection accepts.
pub const MIN_HEADER_BYTES: usize = 8192;

/// Configuration for the notification listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Time allowed for a client to send the request headers
    /// Default: 15 seconds
    pub read_timeout: Duration,

    /// Time allowed to read the body and produce the response
    /// Default: 15 seconds
    pub write_timeout: Duration,

    /// Upper bound on the bytes buffered while reading request headers
    /// Default: 1 MiB
    pub max_header_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
            max_header_bytes: 1 << 20,
        }
    }
}

impl ServerConfig {
    /// Create a ServerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return the first issue found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_timeout == Duration::ZERO {
            return Err(ConfigError::ZeroTimeout("read_timeout"));
        }

        if self.write_timeout == Duration::ZERO {
            return Err(ConfigError::ZeroTimeout("write_timeout"));
        }

        if self.max_header_bytes < MIN_HEADER_BYTES {
            return Err(ConfigError::HeaderLimitTooSmall {
                min: MIN_HEADER_BYTES,
                actual: self.max_header_bytes,
            });
        }

        Ok(())
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_max_header_bytes(mut self, bytes: usize) -> Self {
        self.max_header_bytes = bytes;
        self
    }
}
