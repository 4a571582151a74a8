// Path: crates/api/src/state/mod.rs
//! Core traits for state management.
//!
//! This module defines the primary interfaces for interacting with the chain's
//! state:
//! - `StateAccess`: dyn-safe key-value store operations with prefix scans.
//! - `StateOverlay`: a copy-on-write overlay giving each message a private,
//!   discardable write set.

use std::sync::Arc;

// --- Type Aliases for common state patterns ---
/// An atomically reference-counted, owned key slice.
pub type StateKey = Arc<[u8]>;
/// An atomically reference-counted, owned value slice.
pub type StateVal = Arc<[u8]>;
/// An owned key-value pair from the state, using cheap-to-clone Arcs.
pub type StateKVPair = (StateKey, StateVal);
/// A streaming iterator over key-value pairs from the state. It is Send-safe
/// to be moved across async tasks. `Sync` is omitted as iterators are stateful.
pub type StateScanIter<'a> = Box<dyn Iterator<Item = Result<StateKVPair, StateError>> + Send + 'a>;

mod accessor;
mod overlay;

pub use accessor::*;
pub use meridian_types::error::StateError;
pub use overlay::*;
