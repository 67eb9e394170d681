//! Watch coordinator.
//!
//! Owns the registry of running dispatch tasks and consumers, wires watches
//! to channels (dedicated or shared), and fans shutdown out to every task.
//!
//! Lifecycle: `Init -> Active -> ShutdownRequested -> Joined`.

use crate::channel::{EventReceiver, EventSender, event_channel};
use crate::config::{WatchConfig, WatcherSettings};
use crate::consumer::{EventConsumer, K8sEventHandler};
use crate::dispatch::spawn_dispatch;
use crate::error::WatcherError;
use crate::reflector::ResourceWatcher;
use resource_client::{ResourceClient, ResourceClientFactory};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Lifecycle of a [`WatchCoordinator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Nothing started yet
    Init,
    /// At least one watch has been started
    Active,
    /// Stop signalled; tasks may still be finishing
    ShutdownRequested,
    /// Every task has exited
    Joined,
}

/// A running task and the token that stops it.
#[derive(Debug)]
struct TaskHandle {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct Registry {
    state: CoordinatorState,
    watches: HashMap<String, TaskHandle>,
    consumers: Vec<TaskHandle>,
    shared: Option<(EventSender, EventReceiver)>,
}

/// Starts, tracks and stops watches.
pub struct WatchCoordinator {
    factory: Arc<dyn ResourceClientFactory>,
    settings: WatcherSettings,
    cancel: CancellationToken,
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for WatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl WatchCoordinator {
    pub fn new(factory: Arc<dyn ResourceClientFactory>, settings: WatcherSettings) -> Self {
        Self {
            factory,
            settings,
            cancel: CancellationToken::new(),
            registry: Mutex::new(Registry {
                state: CoordinatorState::Init,
                watches: HashMap::new(),
                consumers: Vec::new(),
                shared: None,
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CoordinatorState {
        self.registry().state
    }

    /// Ids of watches whose dispatch task is still running.
    pub fn active_watch_ids(&self) -> Vec<String> {
        let registry = self.registry();
        let mut ids: Vec<String> = registry
            .watches
            .iter()
            .filter(|(_, task)| !task.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Reject starts after shutdown and ids still held by a running watch.
    fn check_startable(registry: &Registry, ids: &[&str]) -> Result<(), WatcherError> {
        if matches!(
            registry.state,
            CoordinatorState::ShutdownRequested | CoordinatorState::Joined
        ) {
            return Err(WatcherError::InvalidConfig(
                "coordinator has been shut down".to_string(),
            ));
        }
        let mut batch = HashSet::new();
        for id in ids {
            let running = registry
                .watches
                .get(*id)
                .is_some_and(|task| !task.handle.is_finished());
            if running || !batch.insert(*id) {
                return Err(WatcherError::DuplicateWatchId((*id).to_string()));
            }
        }
        Ok(())
    }

    async fn resolve(&self, config: &WatchConfig) -> Result<Arc<dyn ResourceClient>, WatcherError> {
        config.validate()?;
        let client = self
            .factory
            .client_for(&config.kind, config.api_version.as_deref(), config.namespace.as_deref())
            .await?;
        Ok(client)
    }

    fn spawn_watch(
        &self,
        registry: &mut Registry,
        config: WatchConfig,
        client: Arc<dyn ResourceClient>,
        tx: EventSender,
    ) {
        let id = config.id.clone();
        let cancel = self.cancel.child_token();
        let watcher = ResourceWatcher::new(config, client, &self.settings);
        let handle = spawn_dispatch(watcher, tx, cancel.clone());
        debug!(watch_id = %id, "registered watch");
        registry.watches.insert(id, TaskHandle { handle, cancel });
        registry.state = CoordinatorState::Active;
    }

    /// Start one watch and return the channel its events arrive on.
    ///
    /// With `use_shared_channel` every such watch writes into one channel
    /// created on first use; otherwise the watch gets a channel of its own.
    pub async fn start_queued_watch(
        &self,
        config: WatchConfig,
        use_shared_channel: bool,
    ) -> Result<EventReceiver, WatcherError> {
        Self::check_startable(&self.registry(), &[config.id.as_str()])?;
        let client = self.resolve(&config).await?;

        let mut registry = self.registry();
        Self::check_startable(&registry, &[config.id.as_str()])?;
        let (tx, rx) = if use_shared_channel {
            registry
                .shared
                .get_or_insert_with(|| event_channel(self.settings.channel_capacity))
                .clone()
        } else {
            event_channel(self.settings.channel_capacity)
        };
        info!(watch_id = %config.id, kind = %config.kind, shared = use_shared_channel, "starting queued watch");
        self.spawn_watch(&mut registry, config, client, tx);
        Ok(rx)
    }

    /// Start one watch per config, all feeding one channel drained by a single
    /// consumer that calls `handler` for every event.
    ///
    /// Either every watch starts or none does.
    pub async fn start_handled_watch(
        &self,
        configs: Vec<WatchConfig>,
        handler: Arc<dyn K8sEventHandler>,
    ) -> Result<(), WatcherError> {
        if configs.is_empty() {
            return Err(WatcherError::InvalidConfig("no watch configurations given".to_string()));
        }
        let ids: Vec<&str> = configs.iter().map(|c| c.id.as_str()).collect();
        Self::check_startable(&self.registry(), &ids)?;

        let mut resolved = Vec::with_capacity(configs.len());
        for config in &configs {
            resolved.push(self.resolve(config).await?);
        }

        let mut registry = self.registry();
        Self::check_startable(&registry, &ids)?;
        let (tx, rx) = event_channel(self.settings.channel_capacity);
        for (config, client) in configs.iter().cloned().zip(resolved) {
            info!(watch_id = %config.id, kind = %config.kind, "starting handled watch");
            self.spawn_watch(&mut registry, config, client, tx.clone());
        }
        drop(tx);

        let cancel = self.cancel.child_token();
        let consumer = EventConsumer::new(rx, handler, self.settings.consumer_idle_tick);
        let handle = consumer.spawn(cancel.clone());
        registry.consumers.push(TaskHandle { handle, cancel });
        Ok(())
    }

    /// Signal every task to stop. Does not wait.
    pub fn shutdown(&self) {
        let mut registry = self.registry();
        if registry.state != CoordinatorState::Joined {
            registry.state = CoordinatorState::ShutdownRequested;
        }
        info!(watches = registry.watches.len(), consumers = registry.consumers.len(), "shutdown requested");
        for task in registry.watches.values().chain(registry.consumers.iter()) {
            task.cancel.cancel();
        }
        self.cancel.cancel();
    }

    /// Wait until every tracked task has exited.
    ///
    /// Only returns once the tasks end on their own, so call [`shutdown`](Self::shutdown) first
    /// unless waiting for every watch to fail is intended.
    pub async fn join(&self) -> Result<(), WatcherError> {
        let (watches, consumers) = {
            let mut registry = self.registry();
            let watches: Vec<(String, TaskHandle)> = registry.watches.drain().collect();
            let consumers = std::mem::take(&mut registry.consumers);
            (watches, consumers)
        };
        let mut failures = Vec::new();
        for (id, task) in watches {
            if let Err(e) = task.handle.await {
                error!(watch_id = %id, error = %e, "watch task failed");
                failures.push(format!("{id}: {e}"));
            }
        }
        for task in consumers {
            if let Err(e) = task.handle.await {
                error!(error = %e, "consumer task failed");
                failures.push(format!("consumer: {e}"));
            }
        }

        let mut registry = self.registry();
        // Dropping the shared sender lets queued consumers drain and observe the close.
        registry.shared = None;
        if registry.state == CoordinatorState::ShutdownRequested {
            registry.state = CoordinatorState::Joined;
        }
        info!("all watch tasks joined");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(WatcherError::Join(failures.join("; ")))
        }
    }
}

impl Drop for WatchCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
