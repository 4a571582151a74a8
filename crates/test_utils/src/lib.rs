// Path: crates/test_utils/src/lib.rs
#![forbid(unsafe_code)]

//! Shared fixtures for testing Meridian kernel components: an in-memory
//! ordered state store, a state-backed bank, and common account/context
//! builders.

pub mod bank;
pub mod fixtures;
pub mod state;

pub use bank::StateBank;
pub use state::MemState;
