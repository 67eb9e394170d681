//! Client-agnostic object, list and watch models

use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Whether a resource kind lives inside namespaces or at cluster level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceScope {
    /// Namespaced resources (Pods, Ingresses, ...)
    Namespaced,
    /// Cluster-scoped resources (Nodes, Namespaces, ...)
    Cluster,
}

/// Selector and filter parameters shared by list and watch calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Field selector, e.g. `status.phase=Running`
    pub field_selector: Option<String>,
    /// Label selector, e.g. `app=web,tier!=db`
    pub label_selector: Option<String>,
}

/// One object as returned by the API server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    /// `metadata.uid`
    pub uid: String,
    /// Object kind (may be empty on list items; callers fall back to the list kind)
    pub kind: String,
    /// Object apiVersion
    pub api_version: String,
    /// `metadata.name`
    pub name: String,
    /// `metadata.namespace`, absent for cluster-scoped objects
    pub namespace: Option<String>,
    /// `metadata.resourceVersion`
    pub resource_version: String,
    /// Full JSON representation of the object
    pub raw: serde_json::Value,
}

impl ResourceObject {
    /// Convert a kube `DynamicObject`, failing when identity metadata is missing.
    pub fn from_dynamic(obj: &DynamicObject) -> Result<Self, ClientError> {
        let uid = obj
            .metadata
            .uid
            .clone()
            .ok_or_else(|| ClientError::Api("object missing metadata.uid".to_string()))?;
        let (api_version, kind) = obj
            .types
            .as_ref()
            .map(|t| (t.api_version.clone(), t.kind.clone()))
            .unwrap_or_default();
        Ok(Self {
            uid,
            kind,
            api_version,
            name: obj.metadata.name.clone().unwrap_or_default(),
            namespace: obj.metadata.namespace.clone(),
            resource_version: obj.metadata.resource_version.clone().unwrap_or_default(),
            raw: serde_json::to_value(obj)?,
        })
    }
}

/// Result of a full list call
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectList {
    /// List kind as reported by the server, e.g. `PodList`
    pub kind: String,
    /// apiVersion of the listed resource
    pub api_version: String,
    /// Resource version the snapshot is consistent with
    pub resource_version: String,
    /// Items in server order
    pub items: Vec<ResourceObject>,
}

/// One item delivered by a watch stream
#[derive(Debug, Clone, PartialEq)]
pub enum WatchItem {
    /// Object created
    Added(ResourceObject),
    /// Object changed
    Modified(ResourceObject),
    /// Object removed
    Deleted(ResourceObject),
    /// Progress marker carrying only a newer resource version
    Bookmark {
        /// The bookmarked resource version
        resource_version: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::api::TypeMeta;

    fn dynamic(uid: Option<&str>) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: "networking.k8s.io/v1".to_string(),
                kind: "Ingress".to_string(),
            }),
            metadata: ObjectMeta {
                name: Some("web".to_string()),
                namespace: Some("prod".to_string()),
                uid: uid.map(str::to_string),
                resource_version: Some("42".to_string()),
                ..Default::default()
            },
            data: serde_json::json!({ "spec": { "rules": [] } }),
        }
    }

    #[test]
    fn test_from_dynamic_copies_identity() {
        let obj = ResourceObject::from_dynamic(&dynamic(Some("u-1"))).unwrap();
        assert_eq!(obj.uid, "u-1");
        assert_eq!(obj.kind, "Ingress");
        assert_eq!(obj.api_version, "networking.k8s.io/v1");
        assert_eq!(obj.name, "web");
        assert_eq!(obj.namespace.as_deref(), Some("prod"));
        assert_eq!(obj.resource_version, "42");
        assert_eq!(obj.raw["metadata"]["name"], "web");
        assert!(obj.raw["spec"]["rules"].is_array());
    }

    #[test]
    fn test_from_dynamic_requires_uid() {
        let err = ResourceObject::from_dynamic(&dynamic(None)).unwrap_err();
        assert!(matches!(err, ClientError::Api(_)));
    }
}
