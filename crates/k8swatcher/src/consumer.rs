//! Event consumer.
//!
//! Drains an event channel one event at a time and awaits a user supplied
//! [`K8sEventHandler`] for each, so handler latency never throttles the
//! watchers beyond channel backpressure.

use crate::channel::EventReceiver;
use crate::error::WatcherError;
use crate::model::WatchEvent;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capability invoked for every event drained by an [`EventConsumer`].
#[async_trait::async_trait]
pub trait K8sEventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the consumer and never stop it.
    async fn handle(&self, event: WatchEvent) -> Result<(), WatcherError>;
}

/// Single drain loop bound to one channel and one handler.
pub struct EventConsumer {
    rx: EventReceiver,
    handler: Arc<dyn K8sEventHandler>,
    idle_tick: Duration,
}

impl std::fmt::Debug for EventConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventConsumer")
            .field("idle_tick", &self.idle_tick)
            .finish_non_exhaustive()
    }
}

impl EventConsumer {
    /// `idle_tick` bounds how long a read on an empty channel blocks before the stop flag is re-checked.
    pub fn new(rx: EventReceiver, handler: Arc<dyn K8sEventHandler>, idle_tick: Duration) -> Self {
        Self { rx, handler, idle_tick }
    }

    /// Run until `cancel` fires or the channel closes.
    ///
    /// Events are handled strictly in arrival order; the next one is pulled
    /// only after the handler for the previous one has completed.
    pub async fn run(self, cancel: CancellationToken) {
        info!("event consumer started");
        let mut handled: u64 = 0;
        let mut failed: u64 = 0;
        while !cancel.is_cancelled() {
            let event = match self.rx.recv_timeout(self.idle_tick).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("event channel closed");
                    break;
                }
                // Idle: loop around to observe the stop flag.
                Err(_elapsed) => continue,
            };
            let watch_id = event.watch_id.clone();
            let event_type = event.event_type;
            match AssertUnwindSafe(self.handler.handle(event)).catch_unwind().await {
                Ok(Ok(())) => handled += 1,
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(watch_id = %watch_id, event = %event_type, error = %e, "event handler failed");
                }
                Err(_panic) => {
                    failed += 1;
                    warn!(watch_id = %watch_id, event = %event_type, "event handler panicked");
                }
            }
        }
        info!(handled, failed, "event consumer stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
