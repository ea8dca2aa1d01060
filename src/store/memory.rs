//! # In-Memory Store
//!
//! [`ObjectStore`] kept entirely in process. Objects are stored in their JSON
//! form keyed by (kind, namespace, name); cluster-scoped objects use an empty
//! namespace. Writes assign a uid and a monotonically increasing resource
//! version and are broadcast to open watch streams as `Added`, `Modified` or
//! `Deleted` events.
//!
//! Every call is recorded in order so tests can assert exactly which store
//! operations a code path performed. Failures can be queued per
//! (operation, kind) with [`MemoryStore::fail_next`].

use super::{ObjectStore, StoreError, WatchStream};
use crate::controller::resource::{object_name, ManagedResource};
use crate::controller::types::{ObjectKind, WatchEvent};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use kube::Resource;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Store operation, as recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Watch,
    Create,
    Update,
    Delete,
}

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub kind: ObjectKind,
    /// Empty for cluster scope
    pub namespace: String,
    /// Empty for list and watch
    pub name: String,
}

type RawEvent = Result<WatchEvent<Value>, StoreError>;

struct Subscriber {
    kind: ObjectKind,
    namespace: Option<String>,
    sender: mpsc::UnboundedSender<RawEvent>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<(ObjectKind, String, String), Value>,
    calls: Vec<StoreCall>,
    failures: HashMap<(StoreOp, ObjectKind), VecDeque<StoreError>>,
    subscribers: Vec<Subscriber>,
    revision: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryStore")
            .field("objects", &state.objects.len())
            .field("calls", &state.calls.len())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed an object without recording a call or notifying watchers.
    ///
    /// The namespace is taken from the object's metadata.
    pub fn seed<K: ManagedResource>(&self, obj: K) {
        let namespace = obj.meta().namespace.clone().unwrap_or_default();
        let name = object_name(&obj).to_string();
        let mut state = self.lock();
        let value = state.stamp(obj, &namespace, None);
        state.objects.insert((K::KIND, namespace, name), value);
    }

    /// Read an object back, if present
    pub fn get<K: ManagedResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let state = self.lock();
        state
            .objects
            .get(&(K::KIND, namespace.to_string(), name.to_string()))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Sorted names of objects of kind `K` in `namespace`
    pub fn names<K: ManagedResource>(&self, namespace: &str) -> Vec<String> {
        let state = self.lock();
        state
            .objects
            .keys()
            .filter(|(kind, ns, _)| *kind == K::KIND && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    /// Recorded calls, oldest first
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Recorded mutating calls (create, update, delete), oldest first
    pub fn mutations(&self) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c.op, StoreOp::Create | StoreOp::Update | StoreOp::Delete))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the next `op` on `kind` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: StoreOp, kind: ObjectKind, error: StoreError) {
        self.lock()
            .failures
            .entry((op, kind))
            .or_default()
            .push_back(error);
    }

    /// Deliver an arbitrary event to open watch streams of kind `K`.
    ///
    /// The store contents are not changed.
    pub fn push_event<K: ManagedResource>(&self, event: WatchEvent<K>) -> Result<(), StoreError> {
        let namespace = event
            .object()
            .and_then(|obj| obj.meta().namespace.clone())
            .unwrap_or_default();
        let raw = match event {
            WatchEvent::Added(obj) => WatchEvent::Added(to_value(&obj)?),
            WatchEvent::Modified(obj) => WatchEvent::Modified(to_value(&obj)?),
            WatchEvent::Deleted(obj) => WatchEvent::Deleted(to_value(&obj)?),
            WatchEvent::Bookmark => WatchEvent::Bookmark,
        };
        self.lock().broadcast(K::KIND, &namespace, &Ok(raw));
        Ok(())
    }

    /// Deliver a stream error to open watch streams of `kind`
    pub fn push_watch_error(&self, kind: ObjectKind, message: &str) {
        let mut state = self.lock();
        state.subscribers.retain(|sub| {
            sub.kind != kind
                || sub
                    .sender
                    .unbounded_send(Err(StoreError::Watch(message.to_string())))
                    .is_ok()
        });
    }

    /// End every open watch stream of `kind`
    pub fn close_watches(&self, kind: ObjectKind) {
        let mut state = self.lock();
        state.subscribers.retain(|sub| sub.kind != kind);
    }

    /// Number of open watch streams of `kind`
    pub fn watcher_count(&self, kind: ObjectKind) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|sub| !sub.sender.is_closed());
        state.subscribers.iter().filter(|sub| sub.kind == kind).count()
    }
}

impl State {
    fn record(&mut self, op: StoreOp, kind: ObjectKind, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.calls.push(StoreCall {
            op,
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        match self.failures.get_mut(&(op, kind)).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Assign namespace, uid and a fresh resource version, returning JSON
    fn stamp<K: ManagedResource>(&mut self, mut obj: K, namespace: &str, uid: Option<String>) -> Value {
        self.revision += 1;
        let meta = obj.meta_mut();
        meta.namespace = (!namespace.is_empty()).then(|| namespace.to_string());
        meta.uid = Some(uid.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()));
        meta.resource_version = Some(self.revision.to_string());
        serde_json::to_value(&obj).unwrap_or(Value::Null)
    }

    fn broadcast(&mut self, kind: ObjectKind, namespace: &str, event: &RawEvent) {
        self.subscribers.retain(|sub| {
            if sub.kind != kind {
                return true;
            }
            if sub.namespace.as_deref().is_some_and(|ns| ns != namespace) {
                return true;
            }
            sub.sender.unbounded_send(event.clone()).is_ok()
        });
    }
}

fn to_value<K: ManagedResource>(obj: &K) -> Result<Value, StoreError> {
    serde_json::to_value(obj).map_err(|e| StoreError::Invalid(e.to_string()))
}

fn from_value<K: ManagedResource>(value: Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Invalid(e.to_string()))
}

fn uid_of(value: &Value) -> Option<String> {
    value
        .pointer("/metadata/uid")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list<K: ManagedResource>(&self, namespace: Option<&str>) -> Result<Vec<K>, StoreError> {
        let mut state = self.lock();
        state.record(StoreOp::List, K::KIND, namespace.unwrap_or_default(), "")?;
        state
            .objects
            .iter()
            .filter(|((kind, ns, _), _)| *kind == K::KIND && namespace.is_none_or(|want| want == ns))
            .map(|(_, value)| from_value(value.clone()))
            .collect()
    }

    fn watch<K: ManagedResource>(&self, namespace: Option<&str>) -> WatchStream<K> {
        let (sender, receiver) = mpsc::unbounded();
        let mut state = self.lock();
        if let Err(err) = state.record(StoreOp::Watch, K::KIND, namespace.unwrap_or_default(), "") {
            return futures::stream::once(async move { Err(err) }).boxed();
        }
        state.subscribers.push(Subscriber {
            kind: K::KIND,
            namespace: namespace.map(str::to_string),
            sender,
        });
        receiver
            .map(|raw| match raw? {
                WatchEvent::Added(v) => Ok(WatchEvent::Added(from_value(v)?)),
                WatchEvent::Modified(v) => Ok(WatchEvent::Modified(from_value(v)?)),
                WatchEvent::Deleted(v) => Ok(WatchEvent::Deleted(from_value(v)?)),
                WatchEvent::Bookmark => Ok(WatchEvent::Bookmark),
            })
            .boxed()
    }

    async fn create<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K, StoreError> {
        let name = object_name(obj).to_string();
        let mut state = self.lock();
        state.record(StoreOp::Create, K::KIND, namespace, &name)?;
        let key = (K::KIND, namespace.to_string(), name);
        if state.objects.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "{} {namespace}/{} already exists",
                K::KIND,
                key.2
            )));
        }
        let value = state.stamp(obj.clone(), namespace, None);
        state.objects.insert(key, value.clone());
        state.broadcast(K::KIND, namespace, &Ok(WatchEvent::Added(value.clone())));
        from_value(value)
    }

    async fn update<K: ManagedResource>(&self, namespace: &str, obj: &K) -> Result<K, StoreError> {
        let name = object_name(obj).to_string();
        let mut state = self.lock();
        state.record(StoreOp::Update, K::KIND, namespace, &name)?;
        let key = (K::KIND, namespace.to_string(), name);
        let Some(existing) = state.objects.get(&key) else {
            return Err(StoreError::NotFound(format!(
                "{} {namespace}/{}",
                K::KIND,
                key.2
            )));
        };
        let uid = uid_of(existing);
        let value = state.stamp(obj.clone(), namespace, uid);
        state.objects.insert(key, value.clone());
        state.broadcast(K::KIND, namespace, &Ok(WatchEvent::Modified(value.clone())));
        from_value(value)
    }

    async fn delete<K: ManagedResource>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.record(StoreOp::Delete, K::KIND, namespace, name)?;
        let key = (K::KIND, namespace.to_string(), name.to_string());
        match state.objects.remove(&key) {
            Some(value) => {
                state.broadcast(K::KIND, namespace, &Ok(WatchEvent::Deleted(value)));
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{} {namespace}/{name}", K::KIND))),
        }
    }
}
