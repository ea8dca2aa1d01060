//! # Prelude
//!
//! Re-exports commonly used types and traits.

pub use crate::config::ControllerConfig;
pub use crate::controller::reconciler::{resync_once, ResyncReport, SyncContext, WatchTarget};
pub use crate::controller::resource::ManagedResource;
pub use crate::controller::types::{Action, ApplyOutcome, ObjectKind, WatchEvent};
pub use crate::controller::{ControllerError, ControllerSettings, StopHandle, SyncController};
pub use crate::store::{KubeStore, MemoryStore, ObjectStore, StoreError};
