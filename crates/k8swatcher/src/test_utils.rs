//! Test utilities for reflector and coordinator tests

use crate::channel::EventReceiver;
use crate::config::WatcherSettings;
use crate::consumer::K8sEventHandler;
use crate::error::WatcherError;
use crate::model::{WatchEvent, WatchEventType};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Settings with short retry delays so failure paths run quickly
pub fn fast_settings() -> WatcherSettings {
    WatcherSettings {
        poll_timeout: Duration::from_secs(1),
        channel_capacity: 16,
        retry_min: Duration::from_millis(5),
        retry_max: Duration::from_millis(20),
        consumer_idle_tick: Duration::from_millis(10),
    }
}

/// Receive `n` events, failing the test if they do not arrive within two seconds
pub async fn recv_n(rx: &EventReceiver, n: usize) -> Vec<WatchEvent> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        match rx.recv_timeout(Duration::from_secs(2)).await {
            Ok(Some(event)) => out.push(event),
            Ok(None) => panic!("channel closed after {} of {n} events", out.len()),
            Err(_) => panic!("timed out after {} of {n} events", out.len()),
        }
    }
    out
}

/// `(type, cursor, uid)` triples for compact assertions
pub fn summary(events: &[WatchEvent]) -> Vec<(WatchEventType, String, Option<String>)> {
    events
        .iter()
        .map(|e| {
            (
                e.event_type,
                e.resource_version.clone(),
                e.k8s_tracked_object.as_ref().map(|o| o.uid.clone()),
            )
        })
        .collect()
}

/// Handler recording every event, failing on the configured uid
#[derive(Default)]
pub struct RecordingHandler {
    pub events: Mutex<Vec<WatchEvent>>,
    pub fail_uid: Option<String>,
}

impl RecordingHandler {
    pub fn failing_on(uid: &str) -> Self {
        Self { events: Mutex::new(Vec::new()), fail_uid: Some(uid.to_string()) }
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Poll until at least `n` events were recorded
    pub async fn wait_for(self: &Arc<Self>, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("handler did not receive enough events");
    }
}

#[async_trait::async_trait]
impl K8sEventHandler for RecordingHandler {
    async fn handle(&self, event: WatchEvent) -> Result<(), WatcherError> {
        let uid = event.k8s_tracked_object.as_ref().map(|o| o.uid.clone());
        self.events.lock().unwrap().push(event);
        if uid.is_some() && uid == self.fail_uid {
            return Err(WatcherError::Handler(format!("refusing {uid:?}")));
        }
        Ok(())
    }
}
