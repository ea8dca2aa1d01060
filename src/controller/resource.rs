//! # Managed Resources
//!
//! The narrow interface the controller needs from a Kubernetes object kind.
//! Each watched kind implements [`ManagedResource`] once, so the apply engine
//! and the event classifier stay generic instead of switching on runtime type.
//! Name, namespace and annotation access come from [`kube::ResourceExt`].

use crate::controller::types::ObjectKind;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::{Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

pub trait ManagedResource:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: ObjectKind;

    /// Build an API handle for this kind.
    ///
    /// `None` means cluster scope, which is the only scope namespaces support.
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

impl ManagedResource for Namespace {
    const KIND: ObjectKind = ObjectKind::Namespace;

    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

impl ManagedResource for Secret {
    const KIND: ObjectKind = ObjectKind::Secret;

    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

impl ManagedResource for ConfigMap {
    const KIND: ObjectKind = ObjectKind::ConfigMap;

    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

/// Name of an object, empty when the store returned none
pub fn object_name<K: Resource>(obj: &K) -> &str {
    obj.meta().name.as_deref().unwrap_or_default()
}
