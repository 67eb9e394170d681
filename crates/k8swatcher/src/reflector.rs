//! Resource watcher (reflector).
//!
//! A per-watch state machine alternating between a full list and an
//! incremental watch:
//!
//! ```text
//! Initial --list--> Listing --drained--> Watching --cursor expired--> Initial
//!                                          ^    |
//!                                          +----+ stream closed: re-watch from cursor
//! ```
//!
//! [`ResourceWatcher::step`] performs one transition, [`ResourceWatcher::next_event`]
//! drives the machine until it produces an event (retrying failures with
//! backoff), and [`ResourceWatcher::into_stream`] exposes the endless event sequence.

use crate::backoff::FibonacciBackoff;
use crate::config::{WatchConfig, WatcherSettings};
use crate::error::WatcherError;
use crate::model::{TrackedObject, WatchEvent, WatchEventType};
use futures::{Stream, StreamExt};
use resource_client::{ObjectList, ResourceClient, ResourceObject, WatchItem, WatchStream};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Phase of a [`ResourceWatcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherState {
    /// No cursor known; the next step lists
    Initial,
    /// LOADED events of a list are being emitted; the cursor is adopted once they are drained
    Listing {
        /// Resource version of the list being drained
        list_cursor: String,
    },
    /// Streaming changes after the current cursor
    Watching,
}

/// List/watch state machine for one watch configuration.
///
/// Owns its cursor and its tracked-object map; neither is shared.
pub struct ResourceWatcher {
    config: WatchConfig,
    client: Arc<dyn ResourceClient>,
    poll_timeout: Duration,
    state: WatcherState,
    resource_version: Option<String>,
    tracked: HashMap<String, TrackedObject>,
    pending: VecDeque<WatchEvent>,
    stream: Option<WatchStream>,
    api_version: String,
    backoff: FibonacciBackoff,
}

impl std::fmt::Debug for ResourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceWatcher")
            .field("watch_id", &self.config.id)
            .field("kind", &self.config.kind)
            .field("state", &self.state)
            .field("resource_version", &self.resource_version)
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl ResourceWatcher {
    pub fn new(config: WatchConfig, client: Arc<dyn ResourceClient>, settings: &WatcherSettings) -> Self {
        Self {
            config,
            client,
            poll_timeout: settings.poll_timeout,
            state: WatcherState::Initial,
            resource_version: None,
            tracked: HashMap::new(),
            pending: VecDeque::new(),
            stream: None,
            api_version: String::new(),
            backoff: FibonacciBackoff::new(settings.retry_min, settings.retry_max),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    /// Current cursor, `None` before the first list completes or after expiry.
    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    /// Latest snapshot per object uid.
    pub fn tracked_objects(&self) -> &HashMap<String, TrackedObject> {
        &self.tracked
    }

    fn kind_fallback(&self) -> &str {
        self.client.kind()
    }

    fn track(&mut self, obj: &ResourceObject, kind: &str, api_version: &str) -> TrackedObject {
        let tracked =
            TrackedObject::from_resource(obj, kind, api_version, self.config.include_k8s_objects);
        self.tracked.insert(tracked.uid.clone(), tracked.clone());
        tracked
    }

    /// Forget the cursor and any open stream; the next step relists.
    fn restart(&mut self) {
        self.resource_version = None;
        self.stream = None;
        self.pending.clear();
        self.state = WatcherState::Initial;
    }

    async fn list(&mut self) -> Result<(), WatcherError> {
        debug!(watch_id = %self.config.id, kind = %self.config.kind, "listing");
        let list: ObjectList = self
            .client
            .list(&self.config.query_params())
            .await
            .map_err(WatcherError::from_client)?;

        let kind = list
            .kind
            .strip_suffix("List")
            .filter(|k| !k.is_empty())
            .unwrap_or(self.kind_fallback())
            .to_string();
        self.api_version.clone_from(&list.api_version);

        // A relist resynchronises the map: objects missing from the snapshot are gone.
        self.tracked.clear();
        for obj in &list.items {
            let tracked = self.track(obj, &kind, &list.api_version);
            self.pending.push_back(WatchEvent::new(
                &self.config.id,
                WatchEventType::Loaded,
                list.resource_version.clone(),
                Some(tracked),
            ));
        }
        info!(
            watch_id = %self.config.id,
            kind = %kind,
            count = list.items.len(),
            cursor = %list.resource_version,
            "list complete"
        );
        self.state = WatcherState::Listing { list_cursor: list.resource_version };
        Ok(())
    }

    async fn open_watch(&mut self, cursor: &str) -> Result<(), WatcherError> {
        debug!(watch_id = %self.config.id, cursor = %cursor, "opening watch");
        let stream = self
            .client
            .watch(&self.config.query_params(), cursor, self.poll_timeout)
            .await
            .map_err(WatcherError::from_client)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn observe(&mut self, item: WatchItem) -> Option<WatchEvent> {
        let (event_type, obj) = match item {
            WatchItem::Bookmark { resource_version } => {
                self.resource_version = Some(resource_version.clone());
                if self.config.suppress_bookmarks {
                    debug!(watch_id = %self.config.id, cursor = %resource_version, "bookmark (suppressed)");
                    return None;
                }
                return Some(WatchEvent::new(
                    &self.config.id,
                    WatchEventType::Bookmark,
                    resource_version,
                    None,
                ));
            }
            WatchItem::Added(obj) => (WatchEventType::Added, obj),
            WatchItem::Modified(obj) => (WatchEventType::Modified, obj),
            WatchItem::Deleted(obj) => (WatchEventType::Deleted, obj),
        };
        let tracked = TrackedObject::from_resource(
            &obj,
            self.kind_fallback(),
            &self.api_version,
            self.config.include_k8s_objects,
        );
        // Deleted objects keep their final snapshot until the next relist resyncs the map.
        self.tracked.insert(tracked.uid.clone(), tracked.clone());
        self.resource_version = Some(tracked.resource_version.clone());
        debug!(
            watch_id = %self.config.id,
            event = %event_type,
            name = %tracked.name,
            cursor = %tracked.resource_version,
            "watch event"
        );
        Some(WatchEvent::new(
            &self.config.id,
            event_type,
            tracked.resource_version.clone(),
            Some(tracked),
        ))
    }

    /// Perform one state transition, returning the event it produced, if any.
    ///
    /// Cursor expiry resets the watcher to [`WatcherState::Initial`] and is
    /// reported as [`WatcherError::CursorExpired`]; other errors leave the
    /// cursor in place so the next step resumes from it.
    pub async fn step(&mut self) -> Result<Option<WatchEvent>, WatcherError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        match self.state.clone() {
            WatcherState::Initial => {
                self.list().await?;
                Ok(None)
            }
            WatcherState::Listing { list_cursor } => {
                self.resource_version = Some(list_cursor);
                self.state = WatcherState::Watching;
                Ok(None)
            }
            WatcherState::Watching => {
                let Some(cursor) = self.resource_version.clone() else {
                    self.restart();
                    return Ok(None);
                };
                if self.stream.is_none() {
                    if let Err(e) = self.open_watch(&cursor).await {
                        if matches!(e, WatcherError::CursorExpired(_)) {
                            self.restart();
                        }
                        return Err(e);
                    }
                }
                let Some(stream) = self.stream.as_mut() else {
                    return Ok(None);
                };
                match stream.next().await {
                    Some(Ok(item)) => Ok(self.observe(item)),
                    Some(Err(e)) => {
                        self.stream = None;
                        let err = WatcherError::from_client(e);
                        if matches!(err, WatcherError::CursorExpired(_)) {
                            self.restart();
                        }
                        Err(err)
                    }
                    None => {
                        debug!(watch_id = %self.config.id, cursor = %cursor, "watch closed by server, re-establishing");
                        self.stream = None;
                        // A poll that ran to its timeout counts as healthy.
                        self.backoff.reset();
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Drive the state machine until the next event.
    ///
    /// Never fails: cursor expiry relists immediately, any other error is
    /// logged and retried after a Fibonacci backoff that resets on success.
    pub async fn next_event(&mut self) -> WatchEvent {
        loop {
            match self.step().await {
                Ok(Some(event)) => {
                    self.backoff.reset();
                    return event;
                }
                Ok(None) => {}
                Err(WatcherError::CursorExpired(msg)) => {
                    warn!(watch_id = %self.config.id, reason = %msg, "resource version expired, relisting");
                }
                Err(e) => {
                    let delay = self.backoff.next_backoff();
                    error!(
                        watch_id = %self.config.id,
                        kind = %self.config.kind,
                        cursor = ?self.resource_version,
                        error = %e,
                        retry_in = ?delay,
                        "list/watch failed"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Endless stream of events produced by this watcher.
    pub fn into_stream(self) -> impl Stream<Item = WatchEvent> + Send {
        futures::stream::unfold(self, |mut watcher| async move {
            let event = watcher.next_event().await;
            Some((event, watcher))
        })
    }
}
