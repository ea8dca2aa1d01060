//! # Managed Registry
//!
//! In-memory record of which (kind, name) pairs are currently believed to be
//! managed. Shared by every worker behind a single mutex. The view is advisory:
//! it is rebuilt from watch events after a restart and the resync pass heals
//! anything it misses.

use crate::controller::types::ObjectKind;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct ManagedRegistry {
    entries: Mutex<HashMap<(ObjectKind, String), bool>>,
}

impl ManagedRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry for an atomic read-modify-write.
    ///
    /// A poisoned lock is recovered: entries are plain flags and stay valid
    /// even if a holder panicked.
    pub fn lock(&self) -> RegistryGuard<'_> {
        let guard = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        RegistryGuard { entries: guard }
    }

    pub fn is_managed(&self, kind: ObjectKind, name: &str) -> bool {
        self.lock().is_managed(kind, name)
    }

    /// Number of managed entries of `kind`
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.lock().count(kind)
    }

    /// Sorted names of managed entries of `kind`
    pub fn names(&self, kind: ObjectKind) -> Vec<String> {
        let guard = self.lock();
        let mut names: Vec<String> = guard
            .entries
            .iter()
            .filter(|((k, _), managed)| *k == kind && **managed)
            .map(|((_, name), _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Exclusive access to the registry for the duration of one classification
#[derive(Debug)]
pub struct RegistryGuard<'a> {
    entries: MutexGuard<'a, HashMap<(ObjectKind, String), bool>>,
}

impl RegistryGuard<'_> {
    pub fn is_managed(&self, kind: ObjectKind, name: &str) -> bool {
        self.entries
            .get(&(kind, name.to_string()))
            .copied()
            .unwrap_or(false)
    }

    pub fn mark_managed(&mut self, kind: ObjectKind, name: &str) {
        self.entries.insert((kind, name.to_string()), true);
        self.publish(kind);
    }

    /// Drop the entry; absent entries mean unmanaged
    pub fn clear(&mut self, kind: ObjectKind, name: &str) {
        self.entries.remove(&(kind, name.to_string()));
        self.publish(kind);
    }

    /// Mark every name in `names` as managed.
    ///
    /// Existing entries are never cleared here; only a classified event that
    /// produces `Remove` may clear one.
    pub fn mark_all_managed<I>(&mut self, kind: ObjectKind, names: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for name in names {
            self.entries.insert((kind, name.into()), true);
        }
        self.publish(kind);
    }

    fn count(&self, kind: ObjectKind) -> usize {
        self.entries
            .iter()
            .filter(|((k, _), managed)| *k == kind && **managed)
            .count()
    }

    fn publish(&self, kind: ObjectKind) {
        metrics::set_managed_objects(kind, self.count(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_all_managed_only_adds() {
        let registry = ManagedRegistry::new();
        {
            let mut guard = registry.lock();
            guard.mark_managed(ObjectKind::Secret, "opted-out-pending");
            guard.mark_managed(ObjectKind::ConfigMap, "app");
            guard.mark_all_managed(ObjectKind::Secret, ["db", "api"]);
        }
        assert_eq!(
            registry.names(ObjectKind::Secret),
            vec!["api", "db", "opted-out-pending"]
        );
        assert!(registry.is_managed(ObjectKind::ConfigMap, "app"));
    }

    #[test]
    fn test_unknown_entry_is_unmanaged() {
        let registry = ManagedRegistry::new();
        assert!(!registry.is_managed(ObjectKind::Secret, "db-creds"));
    }

    #[test]
    fn test_mark_and_clear() {
        let registry = ManagedRegistry::new();
        {
            let mut guard = registry.lock();
            guard.mark_managed(ObjectKind::Secret, "db-creds");
            guard.mark_managed(ObjectKind::ConfigMap, "db-creds");
        }
        assert!(registry.is_managed(ObjectKind::Secret, "db-creds"));
        assert_eq!(registry.count(ObjectKind::Secret), 1);

        registry.lock().clear(ObjectKind::Secret, "db-creds");
        assert!(!registry.is_managed(ObjectKind::Secret, "db-creds"));
        // kinds are independent
        assert!(registry.is_managed(ObjectKind::ConfigMap, "db-creds"));
    }

    #[test]
    fn test_names_sorted_per_kind() {
        let registry = ManagedRegistry::new();
        {
            let mut guard = registry.lock();
            guard.mark_managed(ObjectKind::Namespace, "team-b");
            guard.mark_managed(ObjectKind::Namespace, "team-a");
            guard.mark_managed(ObjectKind::Secret, "other");
        }
        assert_eq!(
            registry.names(ObjectKind::Namespace),
            vec!["team-a".to_string(), "team-b".to_string()]
        );
    }
}
