//! Tracked object and watch event model.

use chrono::{DateTime, Utc};
use resource_client::ResourceObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of observation carried by a [`WatchEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    /// Object seen during a full list
    Loaded,
    /// Object created
    Added,
    /// Object changed
    Modified,
    /// Object removed
    Deleted,
    /// Cursor advanced without an object change
    Bookmark,
}

impl fmt::Display for WatchEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatchEventType::Loaded => "LOADED",
            WatchEventType::Added => "ADDED",
            WatchEventType::Modified => "MODIFIED",
            WatchEventType::Deleted => "DELETED",
            WatchEventType::Bookmark => "BOOKMARK",
        };
        f.write_str(name)
    }
}

/// Latest known identity snapshot of one cluster object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    /// Cluster-assigned unique id; key of the tracked map
    pub uid: String,
    /// Object kind, e.g. `Pod`
    pub kind: String,
    /// `v1` or `group/version`
    pub api_version: String,
    /// `metadata.name`
    pub name: String,
    /// `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// The object's own resource version
    pub resource_version: String,
    /// Full object, present only when the watch includes raw objects
    pub k8s_object: Option<serde_json::Value>,
}

impl TrackedObject {
    /// Build a snapshot from an observed object.
    ///
    /// `kind` and `api_version` are used when the object itself does not carry them
    /// (list items usually don't). `managedFields` is stripped from included objects.
    pub fn from_resource(
        obj: &ResourceObject,
        kind: &str,
        api_version: &str,
        include_object: bool,
    ) -> Self {
        let k8s_object = include_object.then(|| {
            let mut raw = obj.raw.clone();
            strip_managed_fields(&mut raw);
            raw
        });
        Self {
            uid: obj.uid.clone(),
            kind: if obj.kind.is_empty() { kind.to_string() } else { obj.kind.clone() },
            api_version: if obj.api_version.is_empty() {
                api_version.to_string()
            } else {
                obj.api_version.clone()
            },
            name: obj.name.clone(),
            namespace: obj.namespace.clone(),
            resource_version: obj.resource_version.clone(),
            k8s_object,
        }
    }
}

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata").and_then(serde_json::Value::as_object_mut) {
        meta.remove("managedFields");
    }
}

/// One observation emitted by a reflector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Id of the watch configuration that produced this event
    pub watch_id: String,
    /// What happened to the object
    pub event_type: WatchEventType,
    /// Cursor as of this event
    pub resource_version: String,
    /// Absent only for bookmarks
    pub k8s_tracked_object: Option<TrackedObject>,
    /// When the reflector produced the event
    pub observed_at: DateTime<Utc>,
}

impl WatchEvent {
    pub(crate) fn new(
        watch_id: &str,
        event_type: WatchEventType,
        resource_version: impl Into<String>,
        k8s_tracked_object: Option<TrackedObject>,
    ) -> Self {
        Self {
            watch_id: watch_id.to_string(),
            event_type,
            resource_version: resource_version.into(),
            k8s_tracked_object,
            observed_at: Utc::now(),
        }
    }
}
