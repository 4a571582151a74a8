// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Meridian Kernel Types
//!
//! This crate is the foundational library for the Meridian kernel, containing
//! all core data structures, error types, and configuration objects for the
//! decentralized service market and its oracle-feed overlay.
//!
//! ## Architectural Role
//!
//! As the base crate, `meridian-types` has minimal dependencies and is itself a
//! dependency for almost every other crate in the workspace. This structure
//! prevents circular dependencies and provides a stable, canonical definition
//! for shared types like `AccountId`, `RequestContext`, `ServiceBinding`, and
//! the various error enums.

/// Core application-level data structures like `AccountId`, service-market
/// records, oracle feeds, and guardian profilers.
pub mod app;
/// The canonical, deterministic binary codec for consensus-critical state.
pub mod codec;
/// A unified set of all error types used across the workspace.
pub mod error;
/// Constants and builders for well-known state keys.
pub mod keys;
/// Injected configuration structures for the on-chain service modules.
pub mod service_configs;
