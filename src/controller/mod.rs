//! # Controller
//!
//! Replication engine for opted-in Secrets and ConfigMaps.
//!
//! - `types`: kinds, actions, watch events and apply outcomes
//! - `resource`: the `ManagedResource` trait over the replicated kinds
//! - `policy`: annotation parsing and object sanitising
//! - `registry`: in-memory record of what is currently managed
//! - `classifier`: watch event to action decision
//! - `apply`: one idempotent mutation in one namespace
//! - `reconciler`: event fan-out and the resync pass
//! - `backoff`: exponential backoff for watch failures
//! - `sync_controller`: start/stop/wait lifecycle

pub mod apply;
pub mod backoff;
pub mod classifier;
pub mod policy;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod sync_controller;
pub mod types;

pub use sync_controller::{ControllerError, ControllerSettings, StopHandle, SyncController};
