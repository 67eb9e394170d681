//! Helper functions for building mock objects

use crate::models::{ObjectList, ResourceObject, WatchItem};

/// Build a namespaced object with the given identity and resource version
pub fn object(kind: &str, uid: &str, name: &str, resource_version: &str) -> ResourceObject {
    ResourceObject {
        uid: uid.to_string(),
        kind: kind.to_string(),
        api_version: "v1".to_string(),
        name: name.to_string(),
        namespace: Some("default".to_string()),
        resource_version: resource_version.to_string(),
        raw: serde_json::json!({
            "apiVersion": "v1",
            "kind": kind,
            "metadata": {
                "uid": uid,
                "name": name,
                "namespace": "default",
                "resourceVersion": resource_version,
                "managedFields": [{ "manager": "kubectl" }],
            },
        }),
    }
}

/// Build a list of `kind` at `resource_version`
pub fn object_list(kind: &str, resource_version: &str, items: Vec<ResourceObject>) -> ObjectList {
    ObjectList {
        kind: format!("{kind}List"),
        api_version: "v1".to_string(),
        resource_version: resource_version.to_string(),
        items,
    }
}

/// Build a bookmark watch item
pub fn bookmark(resource_version: &str) -> WatchItem {
    WatchItem::Bookmark {
        resource_version: resource_version.to_string(),
    }
}
