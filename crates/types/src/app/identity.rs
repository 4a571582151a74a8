// Path: crates/types/src/app/identity.rs

//! Defines the canonical `AccountId` and `ChainId` identity types.
//!
//! This module serves as the foundational source of truth for on-chain identity,
//! ensuring consistency across all services and state transitions.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A unique identifier for a blockchain, used for replay protection.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Default,
    Hash,
)]
#[serde(transparent)] // Ensures JSON/TOML is just the raw u32
pub struct ChainId(pub u32);

impl From<u32> for ChainId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
impl From<ChainId> for u32 {
    fn from(c: ChainId) -> Self {
        c.0
    }
}

impl core::fmt::Display for ChainId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique, stable identifier for an on-chain account, derived from the hash of a public key.
///
/// This `AccountId` remains constant even if the underlying cryptographic keys are rotated,
/// providing a persistent address for accounts. It is represented as a 32-byte array.
#[derive(
    Encode,
    Decode,
    Serialize,
    Deserialize,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Debug,
    Default,
    Hash,
)]
pub struct AccountId(pub [u8; 32]);

impl AsRef<[u8]> for AccountId {
    /// Allows treating the `AccountId` as a byte slice.
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for AccountId {
    /// Allows creating an `AccountId` directly from a 32-byte array.
    fn from(hash: [u8; 32]) -> Self {
        Self(hash)
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
