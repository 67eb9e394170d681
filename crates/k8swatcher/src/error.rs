//! Watcher error types.
//!
//! This module defines the errors produced by the reflector, the dispatch
//! tasks, the event consumer and the coordinator.

use resource_client::ClientError;
use thiserror::Error;

/// Errors that can occur while watching resources.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// Resource client error (transport, auth, protocol)
    #[error("Resource client error: {0}")]
    Client(#[from] ClientError),

    /// The watch cursor expired; the reflector must relist
    #[error("Resource version expired: {0}")]
    CursorExpired(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A watch with this id is already active
    #[error("Duplicate watch id: {0}")]
    DuplicateWatchId(String),

    /// Every receiver of the event channel has been dropped
    #[error("Event channel closed")]
    ChannelClosed,

    /// An event handler failed
    #[error("Event handler failed: {0}")]
    Handler(String),

    /// Watch file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Watch file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A watch task panicked or was aborted
    #[error("Task join failed: {0}")]
    Join(String),
}

impl WatcherError {
    /// Classify a client error, turning cursor expiry into the restart signal.
    pub fn from_client(err: ClientError) -> Self {
        match err {
            ClientError::CursorExpired(msg) => WatcherError::CursorExpired(msg),
            other => WatcherError::Client(other),
        }
    }
}
