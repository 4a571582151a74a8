// Path: crates/api/src/callback.rs
//! The response callback interface between the request-context engine and the
//! modules that own contexts.

use crate::state::StateAccess;
use meridian_types::app::service::RequestContextId;
use meridian_types::error::TransactionError;

/// A per-module handler invoked by the engine when a batch of a module-owned
/// request context completes.
///
/// Handlers are registered once at process start under the owning module's
/// name; re-registering for the same name overwrites, since registration
/// happens again on every restart. Errors returned from the handler are
/// swallowed and logged by the engine, never propagated: batch state has
/// already been committed when the callback fires.
pub trait ResponseCallback: Send + Sync {
    /// Receives the completed batch's raw response payloads, ordered by
    /// provider key. Error responses are represented as empty strings; expired
    /// requests contribute no entry.
    fn on_batch_complete(
        &self,
        state: &mut dyn StateAccess,
        block_height: u64,
        context_id: RequestContextId,
        outputs: &[String],
    ) -> Result<(), TransactionError>;
}
