//! Factory handing out registered mock clients

use super::MockResourceClient;
use crate::client_trait::ResourceClient;
use crate::error::ClientError;
use crate::registry::ResourceClientFactory;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock factory resolving kinds to pre-registered [`MockResourceClient`]s
#[derive(Clone, Default)]
pub struct MockClientFactory {
    clients: Arc<Mutex<HashMap<String, MockResourceClient>>>,
}

impl std::fmt::Debug for MockClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClientFactory").finish_non_exhaustive()
    }
}

impl MockClientFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` under its kind (for test setup)
    pub fn register(&self, client: MockResourceClient) -> &Self {
        self.clients
            .lock()
            .unwrap()
            .insert(client.kind().to_ascii_lowercase(), client);
        self
    }
}

#[async_trait::async_trait]
impl ResourceClientFactory for MockClientFactory {
    async fn client_for(
        &self,
        kind: &str,
        _api_version: Option<&str>,
        _namespace: Option<&str>,
    ) -> Result<Arc<dyn ResourceClient>, ClientError> {
        let client = self
            .clients
            .lock()
            .unwrap()
            .get(&kind.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| ClientError::UnknownKind(kind.to_string()))?;
        Ok(Arc::new(client))
    }
}
