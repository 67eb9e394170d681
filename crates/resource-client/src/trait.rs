//! ResourceClient trait for mocking
//!
//! This trait abstracts list/watch access to one resource kind so that the
//! reflector can be driven by the kube-backed client in production and by
//! scripted mock implementations in tests.

use crate::error::ClientError;
use crate::models::{ObjectList, QueryParams, ResourceScope, WatchItem};
use futures::stream::BoxStream;
use std::time::Duration;

/// Stream of watch items; `None` means the server closed the long poll cleanly.
pub type WatchStream = BoxStream<'static, Result<WatchItem, ClientError>>;

/// Trait for list/watch operations against one resource kind and scope
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    /// Kind served by this client, e.g. `Pod`
    fn kind(&self) -> &str;

    /// Whether the client addresses namespaced or cluster-scoped objects
    fn scope(&self) -> ResourceScope;

    /// Full snapshot of all objects matching `params`, with the list's resource version.
    async fn list(&self, params: &QueryParams) -> Result<ObjectList, ClientError>;

    /// Open a watch from `from_cursor`, requesting bookmarks, with a server-side poll timeout.
    ///
    /// Fails with [`ClientError::CursorExpired`] when the cursor is no longer valid,
    /// either immediately or as an item of the returned stream.
    async fn watch(
        &self,
        params: &QueryParams,
        from_cursor: &str,
        timeout: Duration,
    ) -> Result<WatchStream, ClientError>;
}
