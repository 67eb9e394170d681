//! k8swatcher
//!
//! Watches Kubernetes resources and turns the list/watch protocol into a
//! resumable stream of change events:
//!
//! - [`reflector`]: per-watch state machine alternating full lists (LOADED)
//!   and incremental watches (ADDED / MODIFIED / DELETED / BOOKMARK),
//!   relisting whenever the resource version expires
//! - [`dispatch`]: runs one reflector in its own task, feeding an event channel
//! - [`consumer`]: drains a channel into a [`K8sEventHandler`], one event at a time
//! - [`coordinator`]: starts, tracks and stops watches and consumers
//!
//! Delivery is at-least-once across relists; consumers deduplicate if they need to.

pub mod backoff;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod reflector;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod reflector_test;

pub use channel::{EventReceiver, EventSender, event_channel};
pub use config::{WatchConfig, WatchFile, WatcherSettings};
pub use consumer::{EventConsumer, K8sEventHandler};
pub use coordinator::{CoordinatorState, WatchCoordinator};
pub use error::WatcherError;
pub use model::{TrackedObject, WatchEvent, WatchEventType};
pub use reflector::{ResourceWatcher, WatcherState};
