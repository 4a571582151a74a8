// Path: crates/test_utils/src/fixtures/mod.rs
//! Common account and context builders.

use meridian_api::transaction::context::TxContext;
use meridian_types::app::{AccountId, ChainId};

/// A deterministic test account, one per tag byte.
pub fn account_id(tag: u8) -> AccountId {
    AccountId([tag; 32])
}

/// A user-signed transaction context at the given height.
pub fn tx_context(block_height: u64, signer: AccountId) -> TxContext {
    TxContext {
        block_height,
        chain_id: ChainId(1),
        signer_account_id: signer,
        simulation: false,
        is_internal: false,
    }
}

/// The context the chain itself uses for end-of-block hooks.
pub fn end_block_context(block_height: u64) -> TxContext {
    TxContext {
        block_height,
        chain_id: ChainId(1),
        signer_account_id: AccountId::default(),
        simulation: false,
        is_internal: true,
    }
}
