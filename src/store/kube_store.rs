//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server.
//!
//! Watches use `kube_runtime::watcher`, which relists and resumes on its own
//! after a failure is yielded. Event mapping:
//!
//! - `InitApply` -> `Added` (objects present when the stream (re)starts)
//! - `Apply` -> `Modified` (live creates and updates)
//! - `Delete` -> `Deleted`
//! - `Init` / `InitDone` -> `Bookmark`

use super::{ObjectStore, StoreError, WatchStream};
use crate::controller::resource::{object_name, ManagedResource};
use crate::controller::types::WatchEvent;
use async_trait::async_trait;
use futures::StreamExt;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::Client;
use kube_runtime::watcher;
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn list<K: ManagedResource>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let api = K::api(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(map_kube_error)?;
        Ok(list.items)
    }

    fn watch<K: ManagedResource>(&self, namespace: Option<&str>) -> WatchStream<K> {
        let api = K::api(self.client.clone(), namespace);
        debug!(kind = %K::KIND, namespace = namespace.unwrap_or("*"), "store.watch.open");
        watcher(api, watcher::Config::default())
            .map(|event| match event {
                Ok(watcher::Event::InitApply(obj)) => Ok(WatchEvent::Added(obj)),
                Ok(watcher::Event::Apply(obj)) => Ok(WatchEvent::Modified(obj)),
                Ok(watcher::Event::Delete(obj)) => Ok(WatchEvent::Deleted(obj)),
                Ok(watcher::Event::Init | watcher::Event::InitDone) => Ok(WatchEvent::Bookmark),
                Err(e) => Err(StoreError::Watch(e.to_string())),
            })
            .boxed()
    }

    async fn create<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K, StoreError> {
        K::api(self.client.clone(), Some(namespace))
            .create(&PostParams::default(), obj)
            .await
            .map_err(map_kube_error)
    }

    async fn update<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K, StoreError> {
        K::api(self.client.clone(), Some(namespace))
            .replace(object_name(obj), &PostParams::default(), obj)
            .await
            .map_err(map_kube_error)
    }

    async fn delete<K: ManagedResource>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        K::api(self.client.clone(), Some(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(map_kube_error)
    }
}

/// Map API status codes onto the store taxonomy
fn map_kube_error(err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(status) => match status.code {
            404 => StoreError::NotFound(status.message),
            409 => StoreError::Conflict(status.message),
            422 => StoreError::Invalid(status.message),
            code => StoreError::Api(format!("{code}: {}", status.message)),
        },
        other => StoreError::Api(other.to_string()),
    }
}
