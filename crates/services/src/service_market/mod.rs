// Path: crates/services/src/service_market/mod.rs
//! The decentralized service market.
//!
//! One module, four concerns split across submodules:
//! - `registry`: service definitions and provider bindings with staked deposits
//! - `engine`: the request-context state machine and per-block batch scheduling
//! - `settlement`: response handling and the fee accumulators
//! - `callback`: batch-completion dispatch to owning modules
//!
//! All state lives under `service::` keys; all funds in flight (deposits and
//! batch fee escrow) live in this module's bank escrow account.

mod callback;
mod engine;
mod registry;
mod settlement;

use async_trait::async_trait;
use meridian_api::bank::BankKeeper;
use meridian_api::callback::ResponseCallback;
use meridian_api::guardian::GuardianKeeper;
use meridian_api::lifecycle::OnEndBlock;
use meridian_api::services::BlockchainService;
use meridian_api::state::StateAccess;
use meridian_api::transaction::context::TxContext;
use meridian_types::app::service::{Pricing, RequestContextUpdate, RequestContextId, RequestId, ResponseBody};
use meridian_types::app::AccountId;
use meridian_types::codec;
use meridian_types::error::{StateError, TransactionError};
use meridian_types::service_configs::{Capabilities, ServiceParams};
use parity_scale_codec::{Decode, Encode};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// The module name, used for the bank escrow account and dispatch routing.
pub const MODULE_NAME: &str = "service";

/// Parameters for `define@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct DefineServiceParams {
    /// The unique service name.
    pub name: String,
    /// A human-readable description.
    pub description: String,
    /// Free-form discovery tags.
    pub tags: Vec<String>,
    /// The input/output/error schema document.
    pub schemas: String,
}

/// Parameters for `bind@v1`. The provider is the transaction signer.
#[derive(Encode, Decode, Clone, Debug)]
pub struct BindServiceParams {
    /// The service to bind to.
    pub service_name: String,
    /// The deposit to move into module escrow.
    pub deposit: u128,
    /// The declared pricing.
    pub pricing: Pricing,
}

/// Parameters for `update_binding@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UpdateBindingParams {
    /// The bound service.
    pub service_name: String,
    /// Additional deposit to escrow, zero for none.
    pub added_deposit: u128,
    /// Replacement pricing, `None` to keep the current one.
    pub pricing: Option<Pricing>,
}

/// Parameters for `set_withdraw_address@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct SetWithdrawAddressParams {
    /// The bound service.
    pub service_name: String,
    /// Where future deposit refunds are sent.
    pub withdraw_address: AccountId,
}

/// Parameters for `disable@v1` and `refund_deposit@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct BindingRefParams {
    /// The bound service.
    pub service_name: String,
}

/// Parameters for `enable@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct EnableBindingParams {
    /// The bound service.
    pub service_name: String,
    /// Additional deposit to escrow, zero for none.
    pub added_deposit: u128,
}

/// Parameters for `call@v1`: create a request context in the running state.
/// The consumer is the transaction signer.
#[derive(Encode, Decode, Clone, Debug)]
pub struct CallServiceParams {
    /// The service to invoke.
    pub service_name: String,
    /// The ordered candidate provider set.
    pub providers: Vec<AccountId>,
    /// The request input forwarded to every provider.
    pub input: String,
    /// The per-request fee ceiling.
    pub service_fee_cap: u128,
    /// The response timeout in blocks.
    pub timeout: u64,
    /// Whether the context repeats.
    pub repeated: bool,
    /// Blocks between batch starts. Zero defaults to `timeout`.
    pub repeated_frequency: u64,
    /// Total batch runs, `-1` for unbounded. Ignored when not repeated.
    pub repeated_total: i64,
    /// Minimum responses for batch sufficiency. Zero waits for all.
    pub response_threshold: u32,
}

/// Parameters for `start_context@v1`, `pause_context@v1`, and `kill_context@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct ContextRefParams {
    /// The target request context.
    pub context_id: RequestContextId,
}

/// Parameters for `update_context@v1`.
#[derive(Encode, Decode, Clone, Debug)]
pub struct UpdateContextParams {
    /// The target request context.
    pub context_id: RequestContextId,
    /// The fields to change.
    pub update: RequestContextUpdate,
}

/// Parameters for `respond@v1`. The provider is the transaction signer.
#[derive(Encode, Decode, Clone, Debug)]
pub struct RespondParams {
    /// The pending request being answered.
    pub request_id: RequestId,
    /// The response payload.
    pub body: ResponseBody,
}

/// The service-market module.
///
/// Construction wires in the bank (escrow) and guardian (super-mode) keepers;
/// owning modules register their batch-completion callbacks afterwards via
/// [`ServiceModule::register_response_callback`].
pub struct ServiceModule {
    params: ServiceParams,
    bank: Arc<dyn BankKeeper>,
    guardian: Arc<dyn GuardianKeeper>,
    callbacks: RwLock<BTreeMap<String, Arc<dyn ResponseCallback>>>,
}

impl ServiceModule {
    /// Creates the module with its injected parameters and keepers.
    pub fn new(
        params: ServiceParams,
        bank: Arc<dyn BankKeeper>,
        guardian: Arc<dyn GuardianKeeper>,
    ) -> Self {
        Self {
            params,
            bank,
            guardian,
            callbacks: RwLock::new(BTreeMap::new()),
        }
    }

    /// The module parameters this instance was constructed with.
    pub fn params(&self) -> &ServiceParams {
        &self.params
    }
}

impl std::fmt::Debug for ServiceModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceModule")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlockchainService for ServiceModule {
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
        Capabilities::ON_END_BLOCK
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_on_end_block(&self) -> Option<&dyn OnEndBlock> {
        Some(self)
    }

    async fn handle_service_call(
        &self,
        state: &mut dyn StateAccess,
        method: &str,
        params: &[u8],
        ctx: &mut TxContext,
    ) -> Result<(), TransactionError> {
        match method {
            "define@v1" => {
                let p: DefineServiceParams = codec::from_bytes_canonical(params)?;
                self.define_service(state, ctx, p)
            }
            "bind@v1" => {
                let p: BindServiceParams = codec::from_bytes_canonical(params)?;
                self.bind_service(state, ctx, p)
            }
            "update_binding@v1" => {
                let p: UpdateBindingParams = codec::from_bytes_canonical(params)?;
                self.update_binding(state, ctx, p)
            }
            "set_withdraw_address@v1" => {
                let p: SetWithdrawAddressParams = codec::from_bytes_canonical(params)?;
                self.set_withdraw_address(state, ctx, p)
            }
            "disable@v1" => {
                let p: BindingRefParams = codec::from_bytes_canonical(params)?;
                self.disable_binding(state, ctx, &p.service_name)
            }
            "enable@v1" => {
                let p: EnableBindingParams = codec::from_bytes_canonical(params)?;
                self.enable_binding(state, ctx, p)
            }
            "refund_deposit@v1" => {
                let p: BindingRefParams = codec::from_bytes_canonical(params)?;
                self.refund_deposit(state, ctx, &p.service_name)
            }
            "call@v1" => {
                let p: CallServiceParams = codec::from_bytes_canonical(params)?;
                self.call_service(state, ctx, p).map(|_| ())
            }
            "start_context@v1" => {
                let p: ContextRefParams = codec::from_bytes_canonical(params)?;
                self.start_request_context(state, ctx, &p.context_id)
            }
            "pause_context@v1" => {
                let p: ContextRefParams = codec::from_bytes_canonical(params)?;
                self.pause_request_context(state, ctx, &p.context_id)
            }
            "kill_context@v1" => {
                let p: ContextRefParams = codec::from_bytes_canonical(params)?;
                self.kill_request_context(state, ctx, &p.context_id)
            }
            "update_context@v1" => {
                let p: UpdateContextParams = codec::from_bytes_canonical(params)?;
                self.update_request_context(state, ctx, &p.context_id, p.update)
            }
            "respond@v1" => {
                let p: RespondParams = codec::from_bytes_canonical(params)?;
                self.handle_response(state, ctx, &p.request_id, p.body)
            }
            "withdraw_fees@v1" => self.withdraw_fees(state, ctx),
            "refund_fees@v1" => self.refund_fees(state, ctx),
            _ => Err(TransactionError::Unsupported(format!(
                "Service '{}' has no method '{}'",
                self.id(),
                method
            ))),
        }
    }
}

#[async_trait]
impl OnEndBlock for ServiceModule {
    async fn on_end_block(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
    ) -> Result<(), StateError> {
        // Expirations first, so a batch that both expires and was scheduled to
        // repeat at this height finalizes before its successor is built.
        self.process_expirations(state, ctx.block_height)?;
        self.process_scheduled_batches(state, ctx.block_height)?;
        Ok(())
    }
}
