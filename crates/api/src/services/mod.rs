// Path: crates/api/src/services/mod.rs
//! Traits for pluggable, dispatchable blockchain services.

use crate::lifecycle::OnEndBlock;
use crate::transaction::context::TxContext;
use async_trait::async_trait;
use meridian_types::error::TransactionError;
use meridian_types::service_configs::Capabilities;
use std::any::Any;

/// The base trait for any service managed by the chain.
///
/// A service exposes its on-chain logic through `handle_service_call`, keyed
/// by versioned method names (`"bind@v1"`). Dispatch is the only entry point
/// for user messages; keeper methods on the concrete type are the entry point
/// for other modules wired in at construction.
#[async_trait]
pub trait BlockchainService: Any + Send + Sync {
    /// A unique, static, lowercase string identifier for the service.
    /// This is used for deterministic sorting and for dispatching `CallService` transactions.
    fn id(&self) -> &str;

    /// The version of the ABI the service expects from the host.
    fn abi_version(&self) -> u32;

    /// A string identifying the schema of the state this service reads/writes.
    fn state_schema(&self) -> &str;

    /// Returns a bitmask of the lifecycle capabilities (hooks) this service implements.
    fn capabilities(&self) -> Capabilities;

    /// Provides access to the concrete type for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Handles a generic, dispatched call from a `CallService` payload.
    /// This is the primary entry point for all on-chain service logic.
    ///
    /// # Default Implementation
    /// The default implementation returns an `Unsupported` error. Services must override
    /// this method to expose callable functions.
    async fn handle_service_call(
        &self,
        state: &mut dyn crate::state::StateAccess,
        method: &str,
        params: &[u8],
        ctx: &mut TxContext,
    ) -> Result<(), TransactionError> {
        // Mark parameters as used to satisfy the compiler under the default implementation.
        let _ = (state, method, params, ctx);
        Err(TransactionError::Unsupported(format!(
            "Service '{}' does not implement the handle_service_call capability or the method '{}'",
            self.id(),
            method
        )))
    }

    /// Attempts to downcast this service to an `OnEndBlock` trait object.
    fn as_on_end_block(&self) -> Option<&dyn OnEndBlock> {
        None
    }
}
