// Path: crates/types/src/app/guardian.rs

//! Guardian profiler records. A profiler is a privileged account allowed to
//! create oracle feeds and granted super-mode (fee-exempt) request contexts.

use crate::app::AccountId;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A privileged profiler account, keyed by address.
#[derive(Encode, Decode, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Profiler {
    /// The privileged account.
    pub address: AccountId,
    /// The profiler that granted the privilege (self for the bootstrap entry).
    pub added_by: AccountId,
    /// A human-readable description.
    pub description: String,
    /// The height at which the privilege was granted.
    pub added_at: u64,
}
