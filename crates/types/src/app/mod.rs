// Path: crates/types/src/app/mod.rs

//! Core application-level data structures shared across the workspace.

mod identity;

/// Guardian profiler records used to authorize privileged operations.
pub mod guardian;
/// Oracle feed records built on top of the service-market engine.
pub mod oracle;
/// Service definitions, provider bindings, and request-context records.
pub mod service;

pub use identity::{AccountId, ChainId};
