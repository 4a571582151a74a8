// Path: crates/api/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]

//! # Meridian Kernel API
//!
//! Core traits separating the kernel's pluggable pieces from each other: the
//! state store, the transaction execution context, dispatchable on-chain
//! services, the block lifecycle hooks, and the capability interfaces modules
//! consume from one another (bank, guardian, response callbacks).

/// The bank capability: balances, transfers, and module escrow accounts.
pub mod bank;
/// The engine-to-owning-module response callback interface.
pub mod callback;
/// The guardian capability consumed to authorize privileged operations.
pub mod guardian;
/// Traits for services that hook into the block processing lifecycle.
pub mod lifecycle;
/// Traits for pluggable, dispatchable blockchain services.
pub mod services;
/// Core traits for state access and the copy-on-write overlay.
pub mod state;
/// The stable context passed to every transaction execution.
pub mod transaction;
