//! Event channels.
//!
//! A bounded multi-producer queue of [`WatchEvent`]s. The sending half is
//! cloned into every dispatch task feeding the channel. The receiving half is
//! cloneable too: clones share one queue, and each event is delivered to
//! exactly one receiver.

use crate::error::WatcherError;
use crate::model::WatchEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::error::Elapsed;

/// Create a channel holding at most `capacity` undelivered events.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender { tx },
        EventReceiver { rx: Arc::new(Mutex::new(rx)) },
    )
}

/// Producer half; sends wait while the channel is full.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<WatchEvent>,
}

impl EventSender {
    /// Send one event, waiting for capacity.
    pub async fn send(&self, event: WatchEvent) -> Result<(), WatcherError> {
        self.tx.send(event).await.map_err(|_closed| WatcherError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once every receiver has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Consumer half, shareable between consumers.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    rx: Arc<Mutex<mpsc::Receiver<WatchEvent>>>,
}

impl EventReceiver {
    /// Next event; `None` once every sender is gone and the queue is drained.
    pub async fn recv(&self) -> Option<WatchEvent> {
        self.rx.lock().await.recv().await
    }

    /// Like [`recv`](Self::recv) but gives up after `timeout`.
    ///
    /// `Ok(None)` means the channel is closed, `Err(Elapsed)` that nothing arrived in time.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<Option<WatchEvent>, Elapsed> {
        tokio::time::timeout(timeout, self.recv()).await
    }

    /// Blocking receive for consumers running on plain OS threads.
    ///
    /// Must not be called from within an async context.
    pub fn blocking_recv(&self) -> Option<WatchEvent> {
        self.rx.blocking_lock().blocking_recv()
    }

    /// Non-blocking receive; `None` when no event is ready (or another consumer holds the queue).
    pub fn try_recv(&self) -> Option<WatchEvent> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}
