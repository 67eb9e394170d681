//! k8swatcher CLI
//!
//! Watches one Kubernetes kind (or every watch listed in a YAML file) and
//! prints each event as pretty JSON on stdout. Logs go to stderr.
//!
//! Environment:
//! - `RUST_LOG`: log filter (default `info`)
//! - `K8SWATCHER_POLL_TIMEOUT_SECS`, `K8SWATCHER_CHANNEL_CAPACITY`,
//!   `K8SWATCHER_RETRY_MIN_MS`, `K8SWATCHER_RETRY_MAX_MS`: runtime tuning

mod handler;
mod runner;

use anyhow::{Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use k8swatcher::{WatchCoordinator, WatcherSettings};
use resource_client::KubeClientFactory;
use runner::{ExecMode, SingleWatch};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "k8swatcher", version, about = "Watch Kubernetes objects and print every change")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a kind and print LOADED / ADDED / MODIFIED / DELETED events
    Watch {
        /// Kind to watch, e.g. Pod or Ingress
        #[arg(long, required_unless_present = "config")]
        kind: Option<String>,
        /// Group/version to disambiguate the kind, e.g. networking.k8s.io/v1
        #[arg(long)]
        api_version: Option<String>,
        /// Namespace to scope to (namespaced kinds only)
        #[arg(long, env = "K8SWATCHER_NAMESPACE")]
        namespace: Option<String>,
        /// e.g. metadata.name=web,status.phase!=Pending
        #[arg(long)]
        field_selector: Option<String>,
        /// e.g. app=web,tier in (frontend,edge)
        #[arg(long)]
        label_selector: Option<String>,
        /// Drop BOOKMARK events
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        suppress_bookmarks: bool,
        /// Embed the full object in each event
        #[arg(long, action = ArgAction::SetTrue)]
        include_k8s_objects: bool,
        #[arg(long, value_enum, default_value_t = ExecMode::QueuingWatch)]
        exec_mode: ExecMode,
        /// YAML file with a `watches:` list; replaces the single-watch flags
        #[arg(long, env = "K8SWATCHER_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    init_tracing();
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let Commands::Watch {
        kind,
        api_version,
        namespace,
        field_selector,
        label_selector,
        suppress_bookmarks,
        include_k8s_objects,
        exec_mode,
        config,
    } = Cli::parse().command;

    let configs = runner::load_configs(
        config.as_deref(),
        SingleWatch {
            kind,
            api_version,
            namespace,
            field_selector,
            label_selector,
            suppress_bookmarks,
            include_k8s_objects,
        },
    )?;
    let settings = WatcherSettings::from_env()?;
    info!(watches = configs.len(), poll_timeout = ?settings.poll_timeout, "starting k8swatcher");

    let factory = KubeClientFactory::try_default().await?;
    let coordinator = Arc::new(WatchCoordinator::new(Arc::new(factory), settings));
    runner::run(coordinator, configs, exec_mode).await
}
