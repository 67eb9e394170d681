//! Wires the command line onto a [`WatchCoordinator`] and runs until Ctrl-C.

use crate::handler::{PrintHandler, print_event};
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use k8swatcher::{EventReceiver, WatchConfig, WatchCoordinator, WatchFile};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// How events reach the printer
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExecMode {
    /// Events are queued and drained by a dedicated OS thread
    QueuingWatch,
    /// Events are handed to an async handler by a consumer task
    AsyncioWatch,
}

/// Flags describing a single watch
#[derive(Debug, Clone, Default)]
pub struct SingleWatch {
    pub kind: Option<String>,
    pub api_version: Option<String>,
    pub namespace: Option<String>,
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
    pub suppress_bookmarks: bool,
    pub include_k8s_objects: bool,
}

/// Watch configurations to start: from `--config` if given, otherwise one built
/// from the flags with the kind as its id.
pub fn load_configs(config: Option<&std::path::Path>, single: SingleWatch) -> Result<Vec<WatchConfig>> {
    if let Some(path) = config {
        let file = WatchFile::from_path(path)
            .with_context(|| format!("failed to load watch file {}", path.display()))?;
        return Ok(file.watches);
    }
    let Some(kind) = single.kind else {
        bail!("either --kind or --config is required");
    };
    let mut watch = WatchConfig::new(kind.clone(), kind)
        .with_suppress_bookmarks(single.suppress_bookmarks)
        .with_include_k8s_objects(single.include_k8s_objects);
    if let Some(v) = single.api_version {
        watch = watch.with_api_version(v);
    }
    if let Some(ns) = single.namespace {
        watch = watch.with_namespace(ns);
    }
    if let Some(s) = single.field_selector {
        watch = watch.with_field_selector(s);
    }
    if let Some(s) = single.label_selector {
        watch = watch.with_label_selector(s);
    }
    watch.validate()?;
    Ok(vec![watch])
}

/// Start every watch in `mode`, then block until Ctrl-C and shut down cleanly.
pub async fn run(coordinator: Arc<WatchCoordinator>, configs: Vec<WatchConfig>, mode: ExecMode) -> Result<()> {
    let printer = match mode {
        ExecMode::AsyncioWatch => {
            coordinator.start_handled_watch(configs, Arc::new(PrintHandler)).await?;
            None
        }
        ExecMode::QueuingWatch => {
            // Several watches fan into the shared channel; one printer thread drains it.
            let shared = configs.len() > 1;
            let mut rx = None;
            for config in configs {
                rx = Some(coordinator.start_queued_watch(config, shared).await?);
            }
            rx.map(spawn_printer_thread).transpose()?
        }
    };
    info!(mode = ?mode, watches = ?coordinator.active_watch_ids(), "watching, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("interrupt received, shutting down");
    coordinator.shutdown();
    coordinator.join().await?;

    if let Some(printer) = printer {
        let joined = tokio::task::spawn_blocking(move || printer.join()).await?;
        if joined.is_err() {
            warn!("printer thread panicked");
        }
    }
    Ok(())
}

/// Drain `rx` on a plain OS thread until the channel closes.
fn spawn_printer_thread(rx: EventReceiver) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("k8swatcher-printer".to_string())
        .spawn(move || {
            while let Some(event) = rx.blocking_recv() {
                if let Err(e) = print_event(&event) {
                    warn!(watch_id = %event.watch_id, error = %e, "failed to print event");
                }
            }
        })
        .context("failed to spawn printer thread")?;
    Ok(handle)
}
