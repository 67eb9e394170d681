//! Resource client factory
//!
//! Resolves a configured kind (and optional `group/version`) to a
//! [`ResourceClient`] through API discovery, choosing a namespaced or
//! cluster-wide `Api` from the discovered scope.

use crate::client::KubeResourceClient;
use crate::client_trait::ResourceClient;
use crate::error::ClientError;
use crate::models::ResourceScope;
use kube::Client;
use kube::api::ApiResource;
use kube::discovery::{Discovery, Scope};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Creates resource clients for watch configurations
#[async_trait::async_trait]
pub trait ResourceClientFactory: Send + Sync {
    /// Build a client for `kind`, optionally pinned to `api_version` (`v1` or `group/v1`).
    async fn client_for(
        &self,
        kind: &str,
        api_version: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Arc<dyn ResourceClient>, ClientError>;
}

/// Discovered resource with its scope
#[derive(Debug, Clone)]
struct DiscoveredResource {
    resource: ApiResource,
    scope: ResourceScope,
}

/// Factory backed by a kube client and cached API discovery
pub struct KubeClientFactory {
    client: Client,
    discovered: OnceCell<Vec<DiscoveredResource>>,
}

impl std::fmt::Debug for KubeClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClientFactory")
            .field("discovered", &self.discovered.get().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl KubeClientFactory {
    /// Create a factory from an existing kube client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            discovered: OnceCell::new(),
        }
    }

    /// Create a factory using the default kubeconfig / in-cluster configuration.
    pub async fn try_default() -> Result<Self, ClientError> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    async fn discovered(&self) -> Result<&[DiscoveredResource], ClientError> {
        let resources = self
            .discovered
            .get_or_try_init(|| async {
                let discovery = Discovery::new(self.client.clone())
                    .run()
                    .await
                    .map_err(|e| ClientError::Discovery(e.to_string()))?;
                let mut out = Vec::new();
                for group in discovery.groups() {
                    for (ar, caps) in group.recommended_resources() {
                        let scope = match caps.scope {
                            Scope::Namespaced => ResourceScope::Namespaced,
                            Scope::Cluster => ResourceScope::Cluster,
                        };
                        out.push(DiscoveredResource { resource: ar, scope });
                    }
                }
                info!(count = out.len(), "API discovery complete");
                Ok::<_, ClientError>(out)
            })
            .await?;
        Ok(resources.as_slice())
    }
}

/// Pick the discovered resource matching `kind` (case-insensitive) and, if given, `api_version`.
fn select<'a>(
    resources: &'a [DiscoveredResource],
    kind: &str,
    api_version: Option<&str>,
) -> Option<&'a DiscoveredResource> {
    resources.iter().find(|d| {
        d.resource.kind.eq_ignore_ascii_case(kind)
            && api_version.is_none_or(|av| d.resource.api_version == av)
    })
}

#[async_trait::async_trait]
impl ResourceClientFactory for KubeClientFactory {
    async fn client_for(
        &self,
        kind: &str,
        api_version: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Arc<dyn ResourceClient>, ClientError> {
        let resources = self.discovered().await?;
        let found = select(resources, kind, api_version).ok_or_else(|| {
            ClientError::UnknownKind(match api_version {
                Some(av) => format!("{av}/{kind}"),
                None => kind.to_string(),
            })
        })?;
        debug!(
            kind = %found.resource.kind,
            api_version = %found.resource.api_version,
            scope = ?found.scope,
            "resolved resource client"
        );
        let client = KubeResourceClient::new(
            self.client.clone(),
            found.resource.clone(),
            found.scope,
            namespace,
        )?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;

    fn resource(group: &str, version: &str, kind: &str, scope: ResourceScope) -> DiscoveredResource {
        let gvk = GroupVersionKind::gvk(group, version, kind);
        let plural = format!("{}s", kind.to_lowercase());
        DiscoveredResource {
            resource: ApiResource::from_gvk_with_plural(&gvk, &plural),
            scope,
        }
    }

    #[test]
    fn test_select_by_kind_case_insensitive() {
        let resources = vec![
            resource("", "v1", "Pod", ResourceScope::Namespaced),
            resource("", "v1", "Node", ResourceScope::Cluster),
        ];
        let found = select(&resources, "node", None).unwrap();
        assert_eq!(found.resource.kind, "Node");
        assert_eq!(found.scope, ResourceScope::Cluster);
    }

    #[test]
    fn test_select_pins_api_version() {
        let resources = vec![
            resource("extensions", "v1beta1", "Ingress", ResourceScope::Namespaced),
            resource("networking.k8s.io", "v1", "Ingress", ResourceScope::Namespaced),
        ];
        let found = select(&resources, "Ingress", Some("networking.k8s.io/v1")).unwrap();
        assert_eq!(found.resource.group, "networking.k8s.io");
        assert!(select(&resources, "Ingress", Some("v2")).is_none());
        assert!(select(&resources, "Service", None).is_none());
    }
}
