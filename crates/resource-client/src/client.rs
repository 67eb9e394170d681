//! kube-backed resource client

use crate::error::{ClientError, GONE};
use crate::models::{ObjectList, QueryParams, ResourceObject, ResourceScope, WatchItem};
use crate::client_trait::{ResourceClient, WatchStream};
use futures::StreamExt;
use kube::api::{Api, ApiResource, DynamicObject, ListParams, WatchEvent, WatchParams};
use kube::Client;
use std::time::Duration;
use tracing::debug;

/// The API server rejects watch timeouts at or above this many seconds.
const MAX_WATCH_TIMEOUT_SECS: u32 = 290;

/// Resource client over `kube::Api<DynamicObject>`
#[derive(Clone)]
pub struct KubeResourceClient {
    api: Api<DynamicObject>,
    resource: ApiResource,
    scope: ResourceScope,
}

impl std::fmt::Debug for KubeResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceClient")
            .field("kind", &self.resource.kind)
            .field("api_version", &self.resource.api_version)
            .field("scope", &self.scope)
            .finish()
    }
}

impl KubeResourceClient {
    /// Create a client for `resource`.
    ///
    /// `namespace` narrows a namespaced kind to one namespace; `None` watches all namespaces.
    pub fn new(
        client: Client,
        resource: ApiResource,
        scope: ResourceScope,
        namespace: Option<&str>,
    ) -> Result<Self, ClientError> {
        let api = match (scope, namespace) {
            (ResourceScope::Namespaced, Some(ns)) => Api::namespaced_with(client, ns, &resource),
            (ResourceScope::Namespaced, None) => Api::all_with(client, &resource),
            (ResourceScope::Cluster, None) => Api::all_with(client, &resource),
            (ResourceScope::Cluster, Some(ns)) => {
                return Err(ClientError::InvalidScope(format!(
                    "{} is cluster-scoped, namespace {} does not apply",
                    resource.kind, ns
                )));
            }
        };
        Ok(Self { api, resource, scope })
    }

    fn list_params(params: &QueryParams) -> ListParams {
        let mut lp = ListParams::default();
        if let Some(fields) = params.field_selector.as_deref() {
            lp = lp.fields(fields);
        }
        if let Some(labels) = params.label_selector.as_deref() {
            lp = lp.labels(labels);
        }
        lp
    }

    fn watch_params(params: &QueryParams, timeout: Duration) -> WatchParams {
        let secs = u32::try_from(timeout.as_secs()).unwrap_or(MAX_WATCH_TIMEOUT_SECS);
        // Bookmarks are requested by default; suppression happens in the reflector.
        let mut wp = WatchParams::default()
            .timeout(secs.clamp(1, MAX_WATCH_TIMEOUT_SECS));
        if let Some(fields) = params.field_selector.as_deref() {
            wp = wp.fields(fields);
        }
        if let Some(labels) = params.label_selector.as_deref() {
            wp = wp.labels(labels);
        }
        wp
    }
}

fn to_watch_item(event: WatchEvent<DynamicObject>) -> Result<WatchItem, ClientError> {
    match event {
        WatchEvent::Added(obj) => Ok(WatchItem::Added(ResourceObject::from_dynamic(&obj)?)),
        WatchEvent::Modified(obj) => Ok(WatchItem::Modified(ResourceObject::from_dynamic(&obj)?)),
        WatchEvent::Deleted(obj) => Ok(WatchItem::Deleted(ResourceObject::from_dynamic(&obj)?)),
        WatchEvent::Bookmark(bookmark) => Ok(WatchItem::Bookmark {
            resource_version: bookmark.metadata.resource_version,
        }),
        WatchEvent::Error(status) if status.code == GONE => {
            Err(ClientError::CursorExpired(status.message.clone()))
        }
        WatchEvent::Error(status) => Err(ClientError::Api(format!(
            "watch error {}: {}",
            status.code, status.message
        ))),
    }
}

#[async_trait::async_trait]
impl ResourceClient for KubeResourceClient {
    fn kind(&self) -> &str {
        &self.resource.kind
    }

    fn scope(&self) -> ResourceScope {
        self.scope
    }

    async fn list(&self, params: &QueryParams) -> Result<ObjectList, ClientError> {
        let list = self
            .api
            .list(&Self::list_params(params))
            .await
            .map_err(ClientError::from_kube)?;
        let items = list
            .items
            .iter()
            .map(ResourceObject::from_dynamic)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(kind = %self.resource.kind, count = items.len(), "listed objects");
        Ok(ObjectList {
            kind: format!("{}List", self.resource.kind),
            api_version: self.resource.api_version.clone(),
            resource_version: list.metadata.resource_version.unwrap_or_default(),
            items,
        })
    }

    async fn watch(
        &self,
        params: &QueryParams,
        from_cursor: &str,
        timeout: Duration,
    ) -> Result<WatchStream, ClientError> {
        let stream = self
            .api
            .watch(&Self::watch_params(params, timeout), from_cursor)
            .await
            .map_err(ClientError::from_kube)?;
        Ok(stream
            .map(|res| res.map_err(ClientError::from_kube).and_then(to_watch_item))
            .boxed())
    }
}
