//! Mock ResourceClient for unit testing
//!
//! This module provides scripted implementations of [`ResourceClient`] and
//! [`ResourceClientFactory`] so reflector and coordinator logic can be tested
//! without a running API server.
//!
//! - `helpers.rs` - builders for objects and lists
//! - `factory.rs` - factory handing out registered mock clients by kind

mod factory;
mod helpers;

pub use factory::MockClientFactory;
pub use helpers::{bookmark, object, object_list};

use crate::client_trait::{ResourceClient, WatchStream};
use crate::error::ClientError;
use crate::models::{ObjectList, QueryParams, ResourceScope, WatchItem};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A call observed by the mock, in invocation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list` was called
    List(QueryParams),
    /// `watch` was called from the given cursor
    Watch {
        /// Query parameters of the watch
        params: QueryParams,
        /// Resource version the watch resumed from
        from_cursor: String,
    },
}

/// Scripted response for one `watch` call
#[derive(Debug)]
pub struct WatchScript {
    reject: Option<ClientError>,
    items: Vec<Result<WatchItem, ClientError>>,
    hang: bool,
}

impl WatchScript {
    /// Stream that yields `items` and then closes cleanly
    pub fn items(items: Vec<Result<WatchItem, ClientError>>) -> Self {
        Self { reject: None, items, hang: false }
    }

    /// The `watch` call itself fails with `err`
    pub fn reject(err: ClientError) -> Self {
        Self { reject: Some(err), items: Vec::new(), hang: false }
    }

    /// Keep the stream open (pending) after the scripted items instead of closing it
    #[must_use]
    pub fn then_hang(mut self) -> Self {
        self.hang = true;
        self
    }
}

#[derive(Default)]
struct Script {
    lists: VecDeque<Result<ObjectList, ClientError>>,
    last_list: Option<ObjectList>,
    watches: VecDeque<WatchScript>,
    calls: Vec<Call>,
}

/// Mock ResourceClient for testing
///
/// Responses are consumed in FIFO order. When the list script runs out the
/// last successful list is replayed; when the watch script runs out the
/// watch stays open forever, so a reflector under test idles instead of spinning.
#[derive(Clone)]
pub struct MockResourceClient {
    kind: String,
    scope: ResourceScope,
    script: Arc<Mutex<Script>>,
}

impl std::fmt::Debug for MockResourceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResourceClient")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl MockResourceClient {
    /// Create a new mock client for `kind`
    pub fn new(kind: impl Into<String>, scope: ResourceScope) -> Self {
        Self {
            kind: kind.into(),
            scope,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    /// Queue a successful list response (for test setup)
    pub fn push_list(&self, list: ObjectList) -> &Self {
        self.script.lock().unwrap().lists.push_back(Ok(list));
        self
    }

    /// Queue a failing list response (for test setup)
    pub fn push_list_error(&self, err: ClientError) -> &Self {
        self.script.lock().unwrap().lists.push_back(Err(err));
        self
    }

    /// Queue a watch session (for test setup)
    pub fn push_watch(&self, watch: WatchScript) -> &Self {
        self.script.lock().unwrap().watches.push_back(watch);
        self
    }

    /// All calls made so far
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }
}

#[async_trait::async_trait]
impl ResourceClient for MockResourceClient {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn scope(&self) -> ResourceScope {
        self.scope
    }

    async fn list(&self, params: &QueryParams) -> Result<ObjectList, ClientError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::List(params.clone()));
        match script.lists.pop_front() {
            Some(Ok(list)) => {
                script.last_list = Some(list.clone());
                Ok(list)
            }
            Some(Err(e)) => Err(e),
            None => script
                .last_list
                .clone()
                .ok_or_else(|| ClientError::Api("no scripted list response".to_string())),
        }
    }

    async fn watch(
        &self,
        params: &QueryParams,
        from_cursor: &str,
        _timeout: Duration,
    ) -> Result<WatchStream, ClientError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Watch {
            params: params.clone(),
            from_cursor: from_cursor.to_string(),
        });
        let Some(watch) = script.watches.pop_front() else {
            return Ok(futures::stream::pending().boxed());
        };
        if let Some(err) = watch.reject {
            return Err(err);
        }
        let items = futures::stream::iter(watch.items);
        if watch.hang {
            Ok(items.chain(futures::stream::pending()).boxed())
        } else {
            Ok(items.boxed())
        }
    }
}
