//! Watch dispatch tasks.
//!
//! Runs one [`ResourceWatcher`] in its own tokio task and forwards every
//! event it produces into an event channel. Stopping is cooperative: the
//! cancellation token is checked once per loop iteration and raced against
//! the in-flight list/watch call and channel send.

use crate::channel::EventSender;
use crate::error::WatcherError;
use crate::reflector::ResourceWatcher;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Spawn a dispatch task. The task ends when `cancel` fires or every receiver is gone;
/// it never propagates errors to the caller, it logs them.
pub fn spawn_dispatch(
    watcher: ResourceWatcher,
    tx: EventSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let watch_id = watcher.config().id.clone();
        match run_dispatch(watcher, tx, cancel).await {
            Ok(()) => info!(watch_id = %watch_id, "watch dispatch stopped"),
            Err(e) => error!(watch_id = %watch_id, error = %e, "watch dispatch exited"),
        }
    })
}

/// Dispatch loop body; returns `Ok` on a requested stop.
pub async fn run_dispatch(
    mut watcher: ResourceWatcher,
    tx: EventSender,
    cancel: CancellationToken,
) -> Result<(), WatcherError> {
    info!(
        watch_id = %watcher.config().id,
        kind = %watcher.config().kind,
        namespace = ?watcher.config().namespace,
        "watch dispatch started"
    );
    while !cancel.is_cancelled() {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tx.closed() => return Err(WatcherError::ChannelClosed),
            event = watcher.next_event() => event,
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(watch_id = %watcher.config().id, "stop requested, dropping undelivered event");
                break;
            }
            sent = tx.send(event) => sent?,
        }
    }
    Ok(())
}
