// Path: crates/services/src/guardian/mod.rs
//! The guardian profiler registry.
//!
//! A small self-administered allowlist: profilers add and remove profilers.
//! The registry bootstraps itself by letting anyone add the first entry on a
//! fresh chain; from then on only existing profilers may change it.

use crate::store::{get_typed, put_typed};
use async_trait::async_trait;
use meridian_api::guardian::GuardianKeeper;
use meridian_api::services::BlockchainService;
use meridian_api::state::StateAccess;
use meridian_api::transaction::context::TxContext;
use meridian_types::app::guardian::Profiler;
use meridian_types::app::AccountId;
use meridian_types::codec;
use meridian_types::error::{GuardianError, StateError, TransactionError};
use meridian_types::keys;
use meridian_types::service_configs::Capabilities;
use parity_scale_codec::{Decode, Encode};
use std::any::Any;

/// The module name, used for dispatch routing.
pub const MODULE_NAME: &str = "guardian";

/// Parameters for `add_profiler@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct AddProfilerParams {
    /// The account to grant profiler privilege to.
    pub address: AccountId,
    /// A human-readable description.
    pub description: String,
}

/// Parameters for `delete_profiler@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct DeleteProfilerParams {
    /// The account to revoke.
    pub address: AccountId,
}

/// The guardian module.
#[derive(Debug, Clone, Default)]
pub struct GuardianModule;

impl GuardianModule {
    /// Creates the module.
    pub fn new() -> Self {
        Self
    }

    fn has_any_profiler(&self, state: &dyn StateAccess) -> Result<bool, StateError> {
        let mut iter = state.prefix_scan(keys::GUARDIAN_PROFILER_PREFIX)?;
        match iter.next() {
            Some(item) => {
                item?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_profiler(&self, state: &dyn StateAccess, address: &AccountId) -> Result<bool, StateError> {
        Ok(self.get_profiler(state, address)?.is_some())
    }

    /// Grants profiler privilege. Requires the signer to be a profiler, except
    /// for the very first entry on an empty registry.
    pub fn add_profiler(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: AddProfilerParams,
    ) -> Result<(), TransactionError> {
        let signer = ctx.signer_account_id;
        let authorized = ctx.is_internal
            || self.is_profiler(&*state, &signer)?
            || !self.has_any_profiler(&*state)?;
        if !authorized {
            return Err(GuardianError::Unauthorized(
                "only an existing profiler may add profilers".into(),
            )
            .into());
        }
        if self.is_profiler(&*state, &params.address)? {
            return Err(GuardianError::ProfilerExists(params.address).into());
        }

        let profiler = Profiler {
            address: params.address,
            added_by: signer,
            description: params.description,
            added_at: ctx.block_height,
        };
        put_typed(state, &keys::profiler_key(&profiler.address), &profiler)?;
        log::info!("profiler {} added by {}", profiler.address, signer);
        Ok(())
    }

    /// Revokes profiler privilege. Profilers only; a profiler may revoke
    /// itself.
    pub fn delete_profiler(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: DeleteProfilerParams,
    ) -> Result<(), TransactionError> {
        let signer = ctx.signer_account_id;
        if !ctx.is_internal && !self.is_profiler(&*state, &signer)? {
            return Err(GuardianError::Unauthorized(
                "only an existing profiler may delete profilers".into(),
            )
            .into());
        }
        if !self.is_profiler(&*state, &params.address)? {
            return Err(GuardianError::ProfilerNotFound(params.address).into());
        }
        state.delete(&keys::profiler_key(&params.address))?;
        log::info!("profiler {} deleted by {}", params.address, signer);
        Ok(())
    }
}

impl GuardianKeeper for GuardianModule {
    fn get_profiler(
        &self,
        state: &dyn StateAccess,
        address: &AccountId,
    ) -> Result<Option<Profiler>, StateError> {
        get_typed(state, &keys::profiler_key(address))
    }
}

#[async_trait]
impl BlockchainService for GuardianModule {
    fn id(&self) -> &str {
        MODULE_NAME
    }

    fn abi_version(&self) -> u32 {
        1
    }

    fn state_schema(&self) -> &str {
        "v1"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn handle_service_call(
        &self,
        state: &mut dyn StateAccess,
        method: &str,
        params: &[u8],
        ctx: &mut TxContext,
    ) -> Result<(), TransactionError> {
        match method {
            "add_profiler@v1" => {
                let p: AddProfilerParams = codec::from_bytes_canonical(params)?;
                self.add_profiler(state, ctx, p)
            }
            "delete_profiler@v1" => {
                let p: DeleteProfilerParams = codec::from_bytes_canonical(params)?;
                self.delete_profiler(state, ctx, p)
            }
            _ => Err(TransactionError::Unsupported(format!(
                "Service '{}' has no method '{}'",
                self.id(),
                method
            ))),
        }
    }
}
