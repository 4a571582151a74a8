// Path: crates/services/src/lib.rs
#![forbid(unsafe_code)]

//! On-chain service modules for the Meridian kernel.
//!
//! - `service_market`: the decentralized service request-context engine —
//!   definitions, provider bindings with staked deposits, batch scheduling,
//!   response settlement, and callback dispatch.
//! - `oracle`: a thin feed overlay that owns request contexts in the engine
//!   and aggregates each completed batch of provider outputs.
//! - `guardian`: the profiler registry backing privileged feed creation and
//!   super-mode fee exemption.

pub mod guardian;
pub mod oracle;
pub mod service_market;
mod store;
