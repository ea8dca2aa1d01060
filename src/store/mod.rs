//! # Object Store
//!
//! The controller's only view of the cluster. Everything the reconciliation
//! engine does to the outside world goes through [`ObjectStore`]:
//!
//! - `list` / `watch` to observe namespaces, secrets and config maps
//! - `create` / `update` / `delete` to mutate replicas in target namespaces
//!
//! Two implementations are provided:
//!
//! - [`KubeStore`] talks to the Kubernetes API server through `kube`
//! - [`MemoryStore`] keeps objects in process and is used by the test suite

use crate::controller::resource::ManagedResource;
use crate::controller::types::WatchEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod kube_store;
pub mod memory;

pub use kube_store::KubeStore;
pub use memory::{MemoryStore, StoreCall, StoreOp};

/// Errors returned by the object store
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("watch stream error: {0}")]
    Watch(String),
    #[error("api error: {0}")]
    Api(String),
}

impl StoreError {
    /// Whether the target object does not exist.
    ///
    /// Drives the update-then-create fallback and idempotent deletes.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Watch stream of typed change events
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>, StoreError>>;

/// Cluster object store collaborator.
///
/// `namespace: None` means cluster scope and is only used for namespaces.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    async fn list<K: ManagedResource>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError>;

    /// Open a change stream. Errors are yielded in-stream; the caller decides
    /// whether to keep polling or give up.
    fn watch<K: ManagedResource>(&self, namespace: Option<&str>) -> WatchStream<K>;

    async fn create<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K, StoreError>;

    async fn update<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K, StoreError>;

    async fn delete<K: ManagedResource>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}
