// Path: crates/services/src/service_market/settlement.rs
//! Response handling and the per-account fee accumulators.
//!
//! Fees move exactly once into module escrow when a batch is built, then
//! drain through one of two accumulators: `incoming` for providers that
//! answered (any answer pays, including application-level errors) and
//! `returned` for consumers whose requests expired or were withdrawn.

use super::{ServiceModule, MODULE_NAME};
use crate::store::{get_typed, put_typed};
use meridian_api::state::StateAccess;
use meridian_api::transaction::context::TxContext;
use meridian_types::app::service::{
    CompactRequest, Response, ResponseBody, ServiceFees, RequestContextId, RequestId,
};
use meridian_types::app::AccountId;
use meridian_types::error::{ServiceError, StateError, TransactionError};
use meridian_types::keys;

impl ServiceModule {
    /// Returns an account's fee accumulators, zeroed if never touched.
    pub fn get_fees(
        &self,
        state: &dyn StateAccess,
        account: &AccountId,
    ) -> Result<ServiceFees, StateError> {
        Ok(get_typed(state, &keys::service_fees_key(account))?.unwrap_or_default())
    }

    pub(crate) fn add_incoming_fee(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        amount: u128,
    ) -> Result<(), StateError> {
        let mut fees = self.get_fees(&*state, account)?;
        fees.incoming = fees
            .incoming
            .checked_add(amount)
            .ok_or_else(|| StateError::Apply("incoming fee accumulator overflow".into()))?;
        put_typed(state, &keys::service_fees_key(account), &fees)
    }

    pub(crate) fn add_returned_fee(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        amount: u128,
    ) -> Result<(), StateError> {
        let mut fees = self.get_fees(&*state, account)?;
        fees.returned = fees
            .returned
            .checked_add(amount)
            .ok_or_else(|| StateError::Apply("returned fee accumulator overflow".into()))?;
        put_typed(state, &keys::service_fees_key(account), &fees)
    }

    /// Returns a pending request, if one is still outstanding.
    pub fn get_active_request(
        &self,
        state: &dyn StateAccess,
        request_id: &RequestId,
    ) -> Result<Option<CompactRequest>, StateError> {
        get_typed(state, &keys::active_request_key(request_id))
    }

    /// Returns a stored response, if one exists.
    pub fn get_response(
        &self,
        state: &dyn StateAccess,
        context_id: &RequestContextId,
        batch_counter: u64,
        provider: &AccountId,
    ) -> Result<Option<Response>, StateError> {
        get_typed(
            state,
            &keys::response_key(context_id, batch_counter, provider),
        )
    }

    /// Settles a provider's answer to a pending request.
    ///
    /// Answering pays the fee into the provider's accumulator whether the body
    /// is an output or an application-level error; only failing to answer at
    /// all is penalized. A second answer to the same request, or an answer
    /// after expiry, finds no pending record and fails with `UnknownRequest`.
    pub fn handle_response(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        request_id: &RequestId,
        body: ResponseBody,
    ) -> Result<(), TransactionError> {
        let request: CompactRequest =
            get_typed(&*state, &keys::active_request_key(request_id))?
                .ok_or(ServiceError::UnknownRequest(*request_id))?;
        if !ctx.is_internal && ctx.signer_account_id != request.provider {
            return Err(ServiceError::Unauthorized(
                "only the obligated provider may respond".into(),
            )
            .into());
        }

        let context_id = request.request_context_id;
        let mut context = self
            .get_request_context(&*state, &context_id)?
            .ok_or_else(|| {
                StateError::Apply(format!(
                    "pending request {} references missing context {}",
                    request_id, context_id
                ))
            })?;

        let response = Response {
            provider: request.provider,
            consumer: request.consumer,
            request_context_id: context_id,
            batch_counter: request.batch_counter,
            body,
        };
        put_typed(
            state,
            &keys::response_key(&context_id, request.batch_counter, &request.provider),
            &response,
        )?;
        state.delete(&keys::active_request_key(request_id))?;
        state.delete(&keys::expiration_queue_key(
            request.expiration_height,
            request_id,
        ))?;
        state.delete(&keys::batch_request_key(
            &context_id,
            request.batch_counter,
            &request.provider,
        ))?;

        context.batch_response_count += 1;
        if request.service_fee > 0 {
            self.add_incoming_fee(state, &request.provider, request.service_fee)?;
        }
        if let Some(mut binding) =
            self.get_binding(&*state, &context.service_name, &request.provider)?
        {
            if binding.missed_count != 0 {
                binding.missed_count = 0;
                self.put_binding(state, &binding)?;
            }
        }
        log::debug!(
            "request {} of context {} answered by {}",
            request_id,
            context_id,
            request.provider
        );

        if self.batch_outstanding(&*state, &context_id, request.batch_counter)? == 0 {
            self.finalize_batch(state, &context_id, &mut context, ctx.block_height)?;
        }
        self.put_context(state, &context_id, &context)?;
        Ok(())
    }

    /// Pays out the signer's accumulated earned fees to their own account.
    pub fn withdraw_fees(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let account = ctx.signer_account_id;
        let mut fees = self.get_fees(&*state, &account)?;
        let amount = fees.incoming;
        if amount > 0 {
            self.bank
                .send_from_module(state, MODULE_NAME, &account, amount)?;
            fees.incoming = 0;
            put_typed(state, &keys::service_fees_key(&account), &fees)?;
        }
        log::info!("provider {} withdrew {} in earned fees", account, amount);
        Ok(())
    }

    /// Pays out the signer's accumulated returned fees to their own account.
    pub fn refund_fees(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
    ) -> Result<(), TransactionError> {
        let account = ctx.signer_account_id;
        let mut fees = self.get_fees(&*state, &account)?;
        let amount = fees.returned;
        if amount > 0 {
            self.bank
                .send_from_module(state, MODULE_NAME, &account, amount)?;
            fees.returned = 0;
            put_typed(state, &keys::service_fees_key(&account), &fees)?;
        }
        log::info!("consumer {} reclaimed {} in returned fees", account, amount);
        Ok(())
    }
}
