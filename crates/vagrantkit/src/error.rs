//! Error types for Vagrant configuration operations.

use thiserror::Error;

/// Errors that can occur while validating or writing a configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// A machine was defined with an empty name
    #[error("machine name cannot be empty")]
    EmptyMachineName,

    /// Two machines forward the same host port
    #[error("host port {port} is forwarded by both '{first}' and '{second}'")]
    PortCollision {
        /// The host port forwarded twice
        port: u16,
        /// Machine that claimed the port first
        first: String,
        /// Machine that claimed it again
        second: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for vagrantkit operations.
pub type Result<T> = std::result::Result<T, Error>;
