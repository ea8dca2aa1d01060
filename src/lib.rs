//! nsync Controller Library
//!
//! Replicates Secrets and ConfigMaps annotated with `nsync.verloop.io/managed`
//! from a source namespace into every namespace that carries the same
//! annotation, and removes the replicas when either side opts out.
//!
//! ## Quick Start
//!
//! ```rust
//! use nsync_controller::prelude::*;
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
