// Path: crates/api/src/transaction/context.rs
//! Defines the stable context for transaction execution.

use meridian_types::app::{AccountId, ChainId};

/// Provides stable, read-only context to transaction models and services during execution.
#[derive(Clone, Debug)]
pub struct TxContext {
    /// The current block height being processed. All scheduling in the kernel
    /// is height-driven; there is no wall-clock input to execution.
    pub block_height: u64,
    /// The unique identifier of the chain for replay protection.
    pub chain_id: ChainId,
    /// The `AccountId` of the entity that signed the current transaction.
    /// This is the authoritative source for permission checks within services.
    pub signer_account_id: AccountId,
    /// If true, the transaction is being simulated (e.g., via `check_tx`)
    /// and should not have permanent side effects.
    pub simulation: bool,
    /// If true, the call is initiated by the chain itself or by an owning
    /// module (e.g., end-block hook, oracle driving its own request context)
    /// and is permitted to bypass user-level ownership checks. For
    /// user-initiated transactions, this must always be `false`.
    pub is_internal: bool,
}

impl TxContext {
    /// Returns a copy of this context marked as module-internal, used when an
    /// owning module drives the engine on a user's behalf.
    pub fn as_internal(&self) -> Self {
        let mut ctx = self.clone();
        ctx.is_internal = true;
        ctx
    }
}
