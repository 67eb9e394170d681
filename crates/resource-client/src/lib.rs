//! Kubernetes Resource Client
//!
//! List/watch access to one resource kind, abstracted behind the
//! [`ResourceClient`] trait so the k8swatcher reflector can run against the
//! API server or against scripted mocks.
//!
//! # Example
//!
//! ```no_run
//! use resource_client::{KubeClientFactory, QueryParams, ResourceClientFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = KubeClientFactory::try_default().await?;
//! let pods = factory.client_for("Pod", None, Some("default")).await?;
//! let list = pods.list(&QueryParams::default()).await?;
//! println!("{} pods at resourceVersion {}", list.items.len(), list.resource_version);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Discovery**: kinds resolved to namespaced or cluster-wide APIs at configuration time
//! - **Cursor expiry**: `410 Gone` surfaced as [`ClientError::CursorExpired`]
//! - **Bookmarks**: always requested on watch; suppression is the caller's decision
//! - **Mocking**: `test-util` feature provides `MockResourceClient`

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod client_trait;
pub mod registry;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeResourceClient;
pub use client_trait::{ResourceClient, WatchStream};
pub use error::ClientError;
pub use models::*;
pub use registry::{KubeClientFactory, ResourceClientFactory};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{Call, MockClientFactory, MockResourceClient, WatchScript};
