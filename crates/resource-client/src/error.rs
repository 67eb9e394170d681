//! Resource client errors

use thiserror::Error;

/// HTTP status the API server uses when a resource version is no longer in its watch cache.
pub const GONE: u16 = 410;

/// Errors that can occur when listing or watching through a [`ResourceClient`](crate::ResourceClient)
#[derive(Debug, Error)]
pub enum ClientError {
    /// The resource version the watch was resumed from has expired server side
    #[error("resource version too old: {0}")]
    CursorExpired(String),

    /// The API server returned an error for the request or inside the watch stream
    #[error("Kubernetes API error: {0}")]
    Api(String),

    /// Transport / client level error
    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No served resource matches the requested kind
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    /// Namespace given for a cluster-scoped kind
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// API discovery failed
    #[error("Discovery failed: {0}")]
    Discovery(String),
}

impl ClientError {
    /// Whether this error means the watch cursor is gone and a relist is required.
    pub fn is_cursor_expired(&self) -> bool {
        matches!(self, ClientError::CursorExpired(_))
    }

    /// Classify a kube client error, mapping `410 Gone` to [`ClientError::CursorExpired`].
    pub fn from_kube(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(status) if status.code == GONE => {
                ClientError::CursorExpired(status.message.clone())
            }
            other => ClientError::Kube(other),
        }
    }
}
