//! # Configuration
//!
//! Controller settings from environment variables, overridden by CLI flags.

pub mod controller;

pub use controller::*;
