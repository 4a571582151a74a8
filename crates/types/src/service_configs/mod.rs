// Path: crates/types/src/service_configs/mod.rs
//! Injected configuration structures for the on-chain service modules.
//!
//! These are governance-configurable parameters passed to each module's
//! constructor. They are never compiled-in constants: every validating node
//! must run with the same values for state transitions to agree.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Configuration parameters for the service-market module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceParams {
    /// The maximum response timeout, in blocks, a request context may declare.
    pub max_request_timeout: u64,
    /// The minimum binding deposit as a multiple of the declared base price.
    pub min_deposit_multiple: u64,
    /// Blocks that must elapse after disablement before a deposit refund.
    pub deposit_refund_delay: u64,
    /// Consecutive missed responses after which a binding is auto-disabled.
    pub slash_threshold: u32,
    /// The deposit fraction slashed per missed response, in basis points.
    pub slash_fraction_bp: u32,
}

impl Default for ServiceParams {
    fn default() -> Self {
        Self {
            max_request_timeout: 100,
            min_deposit_multiple: 200,
            deposit_refund_delay: 5760, // ~4 days at 60s/block
            slash_threshold: 3,
            slash_fraction_bp: 100, // 1%
        }
    }
}

/// Configuration parameters for the oracle-feed module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleParams {
    /// The maximum number of aggregated results a feed may retain.
    pub max_latest_history: u64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            max_latest_history: 100,
        }
    }
}

bitflags::bitflags! {
    /// A bitmask representing the lifecycle hooks a service exposes.
    /// This is distinct from the service's callable methods, which are defined in its ABI.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[serde(transparent)]
    pub struct Capabilities: u32 {
        /// Implements the OnEndBlock trait and its `on_end_block` hook.
        const ON_END_BLOCK = 0b0001;
    }
}

impl Encode for Capabilities {
    fn encode_to<T: parity_scale_codec::Output + ?Sized>(&self, dest: &mut T) {
        self.bits().encode_to(dest)
    }
}

impl Decode for Capabilities {
    fn decode<I: parity_scale_codec::Input>(
        input: &mut I,
    ) -> Result<Self, parity_scale_codec::Error> {
        let bits = u32::decode(input)?;
        Self::from_bits(bits).ok_or_else(|| "Invalid bits for Capabilities".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_deserialize_from_json() {
        let params: ServiceParams = serde_json::from_str(
            r#"{
                "max_request_timeout": 50,
                "min_deposit_multiple": 1000,
                "deposit_refund_delay": 100,
                "slash_threshold": 5,
                "slash_fraction_bp": 250
            }"#,
        )
        .unwrap();
        assert_eq!(params.max_request_timeout, 50);
        assert_eq!(params.slash_fraction_bp, 250);
    }

    #[test]
    fn capabilities_roundtrip_through_codec() {
        let caps = Capabilities::ON_END_BLOCK;
        let bytes = crate::codec::to_bytes_canonical(&caps).unwrap();
        let decoded: Capabilities = crate::codec::from_bytes_canonical(&bytes).unwrap();
        assert_eq!(caps, decoded);

        let bad = crate::codec::to_bytes_canonical(&0xFFu32).unwrap();
        assert!(crate::codec::from_bytes_canonical::<Capabilities>(&bad).is_err());
    }
}
