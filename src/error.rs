//! Error types
//!
//! Per-client faults (slow consumers, resets, write errors) never surface
//! here: they only change the client's status and lead to its removal.
//! This type covers what the owning pipeline has to react to.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-level error
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure while setting up the engine (poll, waker, thread)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The multiplex wait failed; the engine cannot continue
    #[error("event loop failed: {0}")]
    EventLoop(String),

    /// The engine has been stopped
    #[error("sink is stopped")]
    Stopped,
}
