//! # Controller Types
//!
//! Shared enums describing what the controller watches, what it decides to do
//! with a watched object, and how a single apply call ended.

use std::fmt;

/// Kinds of objects the controller watches.
///
/// Closed set: namespaces are the replication targets, secrets and config maps
/// in the source namespace are the replicated objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    Namespace,
    ConfigMap,
    Secret,
}

impl ObjectKind {
    /// All kinds, in the order their watch workers are spawned
    pub const ALL: [ObjectKind; 3] = [
        ObjectKind::Namespace,
        ObjectKind::Secret,
        ObjectKind::ConfigMap,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Namespace => "Namespace",
            ObjectKind::ConfigMap => "ConfigMap",
            ObjectKind::Secret => "Secret",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended effect of a classified event on a target namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    /// No observable effect
    #[default]
    Skip,
    /// Create if absent, else update
    Ensure,
    /// Delete if present, tolerating absence
    Remove,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Skip => "Skip",
            Action::Ensure => "Ensure",
            Action::Remove => "Remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change notification from a watch stream.
///
/// `Bookmark` carries no object; it marks stream (re)initialisation boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
    Bookmark,
}

impl<K> WatchEvent<K> {
    /// Object carried by the event, if any
    pub fn object(&self) -> Option<&K> {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => {
                Some(obj)
            }
            WatchEvent::Bookmark => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, WatchEvent::Deleted(_))
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, WatchEvent::Modified(_))
    }

    /// Label used in logs and metrics
    pub fn type_str(&self) -> &'static str {
        match self {
            WatchEvent::Added(_) => "Added",
            WatchEvent::Modified(_) => "Modified",
            WatchEvent::Deleted(_) => "Deleted",
            WatchEvent::Bookmark => "Bookmark",
        }
    }
}

/// Result of one `apply` call, reported through logs and metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The action had no effect to perform (`Skip`)
    Noop,
    /// The object was not eligible for replication
    Skipped,
    Success,
    Error(String),
}

impl ApplyOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Noop => "noop",
            ApplyOutcome::Skipped => "skipped",
            ApplyOutcome::Success => "success",
            ApplyOutcome::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ApplyOutcome::Success)
    }
}
