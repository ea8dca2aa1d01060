//! # Event Classifier
//!
//! Turns one watch event into an [`Action`], reading and updating the managed
//! registry under a single lock so the read-then-write is atomic with respect
//! to other workers and the resync pass.
//!
//! | wants management | registered | event      | action | registry |
//! |------------------|------------|------------|--------|----------|
//! | yes              | no         | any        | Ensure | set      |
//! | yes              | yes        | Modified   | Ensure | set      |
//! | yes              | yes        | Added      | Skip   | -        |
//! | no               | yes        | any        | Remove | cleared  |
//! | no               | no         | any        | Skip   | -        |
//!
//! "Wants management" is false for every `Deleted` event. Events are never
//! coalesced: each one recomputes the decision from the current registry.

use crate::controller::policy::should_manage;
use crate::controller::registry::ManagedRegistry;
use crate::controller::resource::{object_name, ManagedResource};
use crate::controller::types::{Action, WatchEvent};
use tracing::debug;

/// Classify `event` for kind `K`.
///
/// Returns `None` for events without an object.
pub fn classify<K: ManagedResource>(
    registry: &ManagedRegistry,
    event: WatchEvent<K>,
) -> Option<(K, Action)> {
    let wants_manage = match event.object() {
        Some(obj) => should_manage(obj) && !event.is_deleted(),
        None => return None,
    };
    let is_modified = event.is_modified();
    let event_type = event.type_str();
    let obj = match event {
        WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        WatchEvent::Bookmark => return None,
    };
    let name = object_name(&obj);

    let action = {
        let mut registry = registry.lock();
        let is_managed = registry.is_managed(K::KIND, name);
        if wants_manage && (!is_managed || is_modified) {
            registry.mark_managed(K::KIND, name);
            Action::Ensure
        } else if !wants_manage && is_managed {
            registry.clear(K::KIND, name);
            Action::Remove
        } else {
            Action::Skip
        }
    };

    debug!(
        kind = %K::KIND,
        name,
        event = event_type,
        action = %action,
        "classifier.decision"
    );
    Some((obj, action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MANAGED_ANNOTATION;
    use crate::controller::types::ObjectKind;
    use k8s_openapi::api::core::v1::{Namespace, Secret};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn secret(name: &str, managed: Option<&str>) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                annotations: managed.map(|v| {
                    BTreeMap::from([(MANAGED_ANNOTATION.to_string(), v.to_string())])
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn action_of<K: ManagedResource>(registry: &ManagedRegistry, event: WatchEvent<K>) -> Action {
        classify(registry, event).map(|(_, a)| a).expect("event with object")
    }

    #[test]
    fn test_bookmark_yields_nothing() {
        let registry = ManagedRegistry::new();
        assert!(classify::<Secret>(&registry, WatchEvent::Bookmark).is_none());
    }

    #[test]
    fn test_added_managed_ensures_once() {
        let registry = ManagedRegistry::new();
        let s = secret("db", Some("true"));
        assert_eq!(action_of(&registry, WatchEvent::Added(s.clone())), Action::Ensure);
        assert!(registry.is_managed(ObjectKind::Secret, "db"));
        // relist of an already registered object is a no-op
        assert_eq!(action_of(&registry, WatchEvent::Added(s)), Action::Skip);
    }

    #[test]
    fn test_modified_managed_always_ensures() {
        let registry = ManagedRegistry::new();
        let s = secret("db", Some("true"));
        assert_eq!(action_of(&registry, WatchEvent::Modified(s.clone())), Action::Ensure);
        assert_eq!(action_of(&registry, WatchEvent::Modified(s)), Action::Ensure);
    }

    #[test]
    fn test_unmanaged_never_registered_skips() {
        let registry = ManagedRegistry::new();
        assert_eq!(action_of(&registry, WatchEvent::Added(secret("db", None))), Action::Skip);
        assert_eq!(
            action_of(&registry, WatchEvent::Modified(secret("db", Some("false")))),
            Action::Skip
        );
        assert_eq!(action_of(&registry, WatchEvent::Deleted(secret("db", Some("true")))), Action::Skip);
        assert_eq!(registry.count(ObjectKind::Secret), 0);
    }

    #[test]
    fn test_opt_out_removes_and_clears() {
        let registry = ManagedRegistry::new();
        action_of(&registry, WatchEvent::Added(secret("db", Some("true"))));
        assert_eq!(
            action_of(&registry, WatchEvent::Modified(secret("db", Some("false")))),
            Action::Remove
        );
        assert!(!registry.is_managed(ObjectKind::Secret, "db"));
        // a second opt-out event finds nothing left to remove
        assert_eq!(
            action_of(&registry, WatchEvent::Modified(secret("db", Some("false")))),
            Action::Skip
        );
    }

    #[test]
    fn test_delete_of_managed_removes() {
        let registry = ManagedRegistry::new();
        action_of(&registry, WatchEvent::Added(secret("db", Some("true"))));
        assert_eq!(action_of(&registry, WatchEvent::Deleted(secret("db", Some("true")))), Action::Remove);
        assert!(!registry.is_managed(ObjectKind::Secret, "db"));
    }

    #[test]
    fn test_malformed_annotation_removes_previously_managed() {
        let registry = ManagedRegistry::new();
        action_of(&registry, WatchEvent::Added(secret("db", Some("true"))));
        assert_eq!(
            action_of(&registry, WatchEvent::Modified(secret("db", Some("yes")))),
            Action::Remove
        );
    }

    #[test]
    fn test_kinds_are_tracked_separately() {
        let registry = ManagedRegistry::new();
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some("db".to_string()),
                annotations: Some(BTreeMap::from([(
                    MANAGED_ANNOTATION.to_string(),
                    "true".to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(action_of(&registry, WatchEvent::Added(ns)), Action::Ensure);
        assert_eq!(action_of(&registry, WatchEvent::Added(secret("db", Some("true")))), Action::Ensure);
    }

    #[test]
    fn test_registry_follows_last_decision() {
        let registry = ManagedRegistry::new();
        let events = [
            (WatchEvent::Added(secret("db", Some("true"))), true),
            (WatchEvent::Modified(secret("db", Some("true"))), true),
            (WatchEvent::Modified(secret("db", None)), false),
            (WatchEvent::Modified(secret("db", Some("1"))), true),
            (WatchEvent::Deleted(secret("db", Some("1"))), false),
            (WatchEvent::Added(secret("db", Some("t"))), true),
        ];
        for (event, expected) in events {
            classify(&registry, event);
            assert_eq!(registry.is_managed(ObjectKind::Secret, "db"), expected);
        }
    }
}
