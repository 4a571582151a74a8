// Path: crates/services/src/service_market/engine.rs
//! The request-context state machine and per-block batch scheduling.
//!
//! A context moves Running/Paused until it reaches the terminal Completed
//! state; within a batch it moves BatchRunning -> BatchCompleted as requests
//! resolve by response or expiry. All scheduling is height-driven through two
//! ordered queues: one of request expirations, one of pending batch builds.

use super::{CallServiceParams, ServiceModule, MODULE_NAME};
use crate::store::{get_typed, put_typed};
use meridian_api::state::StateAccess;
use meridian_api::transaction::context::TxContext;
use meridian_types::app::service::{
    BatchState, CompactRequest, ContextState, NewRequestContext, RequestContext,
    RequestContextId, RequestContextUpdate, RequestId,
};
use meridian_types::app::AccountId;
use meridian_types::error::{ServiceError, StateError, TransactionError};
use meridian_types::keys;
use std::collections::BTreeSet;

fn validate_providers(providers: &[AccountId]) -> Result<(), ServiceError> {
    if providers.is_empty() {
        return Err(ServiceError::InvalidRequestInput(
            "provider set must not be empty".into(),
        ));
    }
    let unique: BTreeSet<_> = providers.iter().collect();
    if unique.len() != providers.len() {
        return Err(ServiceError::InvalidRequestInput(
            "provider set contains duplicates".into(),
        ));
    }
    Ok(())
}

impl ServiceModule {
    /// Returns a request context, if one exists. Completed contexts remain
    /// readable indefinitely.
    pub fn get_request_context(
        &self,
        state: &dyn StateAccess,
        context_id: &RequestContextId,
    ) -> Result<Option<RequestContext>, StateError> {
        get_typed(state, &keys::request_context_key(context_id))
    }

    pub(crate) fn put_context(
        &self,
        state: &mut dyn StateAccess,
        context_id: &RequestContextId,
        context: &RequestContext,
    ) -> Result<(), StateError> {
        put_typed(state, &keys::request_context_key(context_id), context)
    }

    pub(crate) fn load_context(
        &self,
        state: &dyn StateAccess,
        context_id: &RequestContextId,
    ) -> Result<RequestContext, TransactionError> {
        self.get_request_context(state, context_id)?
            .ok_or_else(|| ServiceError::UnknownRequestContext(*context_id).into())
    }

    fn next_context_sequence(&self, state: &mut dyn StateAccess) -> Result<u64, StateError> {
        let sequence: u64 = get_typed(&*state, keys::SERVICE_CONTEXT_SEQ_KEY)?.unwrap_or(0);
        put_typed(state, keys::SERVICE_CONTEXT_SEQ_KEY, &(sequence + 1))?;
        Ok(sequence)
    }

    /// Only the consumer may drive a context, and module-owned contexts may
    /// only be driven through their owning module.
    fn authorize_context_op(
        &self,
        ctx: &TxContext,
        context: &RequestContext,
    ) -> Result<(), ServiceError> {
        if ctx.is_internal {
            return Ok(());
        }
        if !context.module_name.is_empty() {
            return Err(ServiceError::ModuleOwned(context.module_name.clone()));
        }
        if ctx.signer_account_id != context.consumer {
            return Err(ServiceError::Unauthorized(
                "only the consumer may manage this request context".into(),
            ));
        }
        Ok(())
    }

    /// Creates a request context in the running state on the signer's behalf.
    pub fn call_service(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: CallServiceParams,
    ) -> Result<RequestContextId, TransactionError> {
        let new_context = NewRequestContext {
            service_name: params.service_name,
            providers: params.providers,
            consumer: ctx.signer_account_id,
            input: params.input,
            service_fee_cap: params.service_fee_cap,
            timeout: params.timeout,
            repeated: params.repeated,
            repeated_frequency: params.repeated_frequency,
            repeated_total: params.repeated_total,
            response_threshold: params.response_threshold,
            module_name: String::new(),
        };
        self.create_request_context(state, ctx, new_context, ContextState::Running)
    }

    /// Creates a request context, validating every field and deriving its
    /// deterministic identifier from (consumer, height, sequence).
    ///
    /// A running context builds its first batch at message time, so escrow
    /// failures surface to the caller; a paused one stays dormant until
    /// started. Super mode (fee exemption) is sampled from the guardian
    /// registry once, here.
    pub fn create_request_context(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        mut new_context: NewRequestContext,
        initial_state: ContextState,
    ) -> Result<RequestContextId, TransactionError> {
        if initial_state == ContextState::Completed {
            return Err(ServiceError::InvalidRequestInput(
                "initial state must be running or paused".into(),
            )
            .into());
        }
        if self.get_definition(&*state, &new_context.service_name)?.is_none() {
            return Err(ServiceError::UnknownService(new_context.service_name).into());
        }
        validate_providers(&new_context.providers)?;
        if new_context.input.is_empty() {
            return Err(
                ServiceError::InvalidRequestInput("input must not be empty".into()).into(),
            );
        }
        if new_context.timeout == 0 || new_context.timeout > self.params.max_request_timeout {
            return Err(ServiceError::InvalidRequestInput(format!(
                "timeout must be in 1..={}",
                self.params.max_request_timeout
            ))
            .into());
        }
        if new_context.response_threshold as usize > new_context.providers.len() {
            return Err(ServiceError::InvalidRequestInput(
                "response threshold exceeds provider count".into(),
            )
            .into());
        }
        if new_context.repeated {
            if new_context.repeated_frequency == 0 {
                new_context.repeated_frequency = new_context.timeout;
            }
            if new_context.repeated_frequency < new_context.timeout {
                return Err(ServiceError::InvalidRequestInput(
                    "repeat frequency must be at least the timeout".into(),
                )
                .into());
            }
            if new_context.repeated_total != -1 && new_context.repeated_total <= 0 {
                return Err(ServiceError::InvalidRequestInput(
                    "repeated total must be -1 or positive".into(),
                )
                .into());
            }
        } else {
            new_context.repeated_frequency = 0;
            new_context.repeated_total = 0;
        }

        let sequence = self.next_context_sequence(state)?;
        let context_id = RequestContextId::derive(&new_context.consumer, ctx.block_height, sequence);
        let super_mode = self
            .guardian
            .get_profiler(&*state, &new_context.consumer)?
            .is_some();

        let mut context = RequestContext {
            service_name: new_context.service_name,
            providers: new_context.providers,
            consumer: new_context.consumer,
            input: new_context.input,
            service_fee_cap: new_context.service_fee_cap,
            timeout: new_context.timeout,
            repeated: new_context.repeated,
            repeated_frequency: new_context.repeated_frequency,
            repeated_total: new_context.repeated_total,
            batch_counter: 0,
            batch_request_count: 0,
            batch_response_count: 0,
            batch_state: BatchState::BatchCompleted,
            batch_start_height: 0,
            next_batch_height: 0,
            state: initial_state,
            response_threshold: new_context.response_threshold,
            module_name: new_context.module_name,
            super_mode,
        };
        if context.state == ContextState::Running {
            self.build_batch(state, &context_id, &mut context, ctx.block_height)?;
        }
        self.put_context(state, &context_id, &context)?;
        log::info!(
            "request context {} created for service '{}' by {} ({:?})",
            context_id,
            context.service_name,
            context.consumer,
            context.state
        );
        Ok(context_id)
    }

    /// Resumes a paused context. The next batch is scheduled for the current
    /// height unless one is already collecting responses.
    pub fn start_request_context(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        context_id: &RequestContextId,
    ) -> Result<(), TransactionError> {
        let mut context = self.load_context(&*state, context_id)?;
        self.authorize_context_op(ctx, &context)?;
        if context.state != ContextState::Paused {
            return Err(ServiceError::InvalidContextState {
                actual: context.state,
            }
            .into());
        }
        context.state = ContextState::Running;
        if context.batch_state == BatchState::BatchCompleted {
            self.schedule_batch(state, context_id, &mut context, ctx.block_height)?;
        }
        self.put_context(state, context_id, &context)?;
        log::info!("request context {} started", context_id);
        Ok(())
    }

    /// Pauses a running context. The in-flight batch, if any, still resolves;
    /// only new batch builds stop.
    pub fn pause_request_context(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        context_id: &RequestContextId,
    ) -> Result<(), TransactionError> {
        let mut context = self.load_context(&*state, context_id)?;
        self.authorize_context_op(ctx, &context)?;
        if context.state != ContextState::Running {
            return Err(ServiceError::InvalidContextState {
                actual: context.state,
            }
            .into());
        }
        context.state = ContextState::Paused;
        self.put_context(state, context_id, &context)?;
        log::info!("request context {} paused", context_id);
        Ok(())
    }

    /// Terminates a context. Outstanding requests of the in-flight batch are
    /// withdrawn and their escrowed fees credited back to the consumer's
    /// returned-fee accumulator; no callback fires for a killed batch.
    pub fn kill_request_context(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        context_id: &RequestContextId,
    ) -> Result<(), TransactionError> {
        let mut context = self.load_context(&*state, context_id)?;
        self.authorize_context_op(ctx, &context)?;
        if context.state == ContextState::Completed {
            return Err(ServiceError::InvalidContextState {
                actual: context.state,
            }
            .into());
        }

        if context.batch_state == BatchState::BatchRunning {
            let prefix = keys::batch_request_prefix(context_id, context.batch_counter);
            let entries: Vec<(Vec<u8>, Vec<u8>)> = {
                let mut out = Vec::new();
                for item in state.prefix_scan(&prefix)? {
                    let (key, value) = item?;
                    out.push((key.to_vec(), value.to_vec()));
                }
                out
            };
            for (index_key, raw_id) in entries {
                let id_bytes: [u8; 32] = raw_id.as_slice().try_into().map_err(|_| {
                    StateError::Decode("batch index entry is not a request id".into())
                })?;
                let request_id = RequestId(id_bytes);
                state.delete(&index_key)?;
                let request: Option<CompactRequest> =
                    get_typed(&*state, &keys::active_request_key(&request_id))?;
                let Some(request) = request else {
                    continue;
                };
                state.delete(&keys::active_request_key(&request_id))?;
                state.delete(&keys::expiration_queue_key(
                    request.expiration_height,
                    &request_id,
                ))?;
                if request.service_fee > 0 {
                    self.add_returned_fee(state, &context.consumer, request.service_fee)?;
                }
            }
            context.batch_state = BatchState::BatchCompleted;
        }

        context.state = ContextState::Completed;
        context.next_batch_height = 0;
        self.put_context(state, context_id, &context)?;
        log::info!("request context {} killed", context_id);
        Ok(())
    }

    /// Applies a partial parameter update between batches of a repeating
    /// context. Changes take effect from the next batch build.
    pub fn update_request_context(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        context_id: &RequestContextId,
        update: RequestContextUpdate,
    ) -> Result<(), TransactionError> {
        let mut context = self.load_context(&*state, context_id)?;
        self.authorize_context_op(ctx, &context)?;
        if context.state == ContextState::Completed {
            return Err(ServiceError::InvalidContextState {
                actual: context.state,
            }
            .into());
        }
        if !context.repeated {
            return Err(ServiceError::InvalidRequestInput(
                "only a repeating context can be updated".into(),
            )
            .into());
        }
        if context.batch_state != BatchState::BatchCompleted {
            return Err(ServiceError::BatchInFlight.into());
        }

        if let Some(providers) = update.providers {
            validate_providers(&providers)?;
            if context.response_threshold as usize > providers.len() {
                return Err(ServiceError::InvalidRequestInput(
                    "response threshold exceeds provider count".into(),
                )
                .into());
            }
            context.providers = providers;
        }
        if let Some(cap) = update.service_fee_cap {
            context.service_fee_cap = cap;
        }
        if let Some(frequency) = update.repeated_frequency {
            if frequency < context.timeout {
                return Err(ServiceError::InvalidRequestInput(
                    "repeat frequency must be at least the timeout".into(),
                )
                .into());
            }
            context.repeated_frequency = frequency;
        }
        if let Some(total) = update.repeated_total {
            if total != -1 && total <= 0 {
                return Err(ServiceError::InvalidRequestInput(
                    "repeated total must be -1 or positive".into(),
                )
                .into());
            }
            context.repeated_total = total;
        }

        self.put_context(state, context_id, &context)?;
        log::info!("request context {} updated", context_id);
        Ok(())
    }

    /// Records a pending batch build for `height` and remembers it on the
    /// context, superseding any previously scheduled height.
    fn schedule_batch(
        &self,
        state: &mut dyn StateAccess,
        context_id: &RequestContextId,
        context: &mut RequestContext,
        height: u64,
    ) -> Result<(), StateError> {
        context.next_batch_height = height;
        state.insert(&keys::new_batch_queue_key(height, context_id), b"")
    }

    /// Builds one batch: re-checks provider eligibility, escrows the summed
    /// fees in a single transfer, then issues one pending request per selected
    /// provider.
    ///
    /// Too few eligible providers is not a caller error: the context
    /// fail-stops to Completed and the build reports success. Escrow failure
    /// propagates and must leave state untouched, which holds because the
    /// transfer precedes every write.
    pub(crate) fn build_batch(
        &self,
        state: &mut dyn StateAccess,
        context_id: &RequestContextId,
        context: &mut RequestContext,
        height: u64,
    ) -> Result<(), TransactionError> {
        let mut selected: Vec<(AccountId, u128)> = Vec::new();
        for provider in &context.providers {
            let binding = self.get_binding(&*state, &context.service_name, provider)?;
            let Some(binding) = binding else {
                continue;
            };
            if !binding.available {
                continue;
            }
            let fee = if context.super_mode {
                0
            } else {
                context.service_fee_cap.min(binding.pricing.base_price)
            };
            selected.push((*provider, fee));
        }

        let required = context.response_threshold.max(1);
        if (selected.len() as u32) < required {
            log::warn!(
                "request context {}: {}",
                context_id,
                ServiceError::InsufficientProviders {
                    available: selected.len() as u32,
                    required,
                }
            );
            context.state = ContextState::Completed;
            context.next_batch_height = 0;
            return Ok(());
        }

        let mut total_fee: u128 = 0;
        for (_, fee) in &selected {
            total_fee = total_fee
                .checked_add(*fee)
                .ok_or(TransactionError::BalanceOverflow)?;
        }
        if total_fee > 0 {
            self.bank
                .send_to_module(state, &context.consumer, MODULE_NAME, total_fee)?;
        }

        context.batch_counter += 1;
        context.batch_request_count = selected.len() as u32;
        context.batch_response_count = 0;
        context.batch_state = BatchState::BatchRunning;
        context.batch_start_height = height;
        context.next_batch_height = 0;
        let expiration_height = height + context.timeout;

        for (index, (provider, fee)) in selected.iter().enumerate() {
            let request_id = RequestId::derive(context_id, context.batch_counter, index as u32);
            let request = CompactRequest {
                request_context_id: *context_id,
                batch_counter: context.batch_counter,
                provider: *provider,
                consumer: context.consumer,
                input: context.input.clone(),
                service_fee: *fee,
                request_height: height,
                expiration_height,
                super_mode: context.super_mode,
            };
            put_typed(state, &keys::active_request_key(&request_id), &request)?;
            state.insert(
                &keys::batch_request_key(context_id, context.batch_counter, provider),
                request_id.as_ref(),
            )?;
            state.insert(
                &keys::expiration_queue_key(expiration_height, &request_id),
                b"",
            )?;
        }
        log::debug!(
            "request context {}: batch {} issued to {} providers, fee escrow {}",
            context_id,
            context.batch_counter,
            context.batch_request_count,
            total_fee
        );
        Ok(())
    }

    /// The number of unresolved requests remaining in a batch.
    pub(crate) fn batch_outstanding(
        &self,
        state: &dyn StateAccess,
        context_id: &RequestContextId,
        batch_counter: u64,
    ) -> Result<usize, StateError> {
        let prefix = keys::batch_request_prefix(context_id, batch_counter);
        let mut count = 0usize;
        for item in state.prefix_scan(&prefix)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// Resolves every request whose expiration height has been reached.
    pub(crate) fn process_expirations(
        &self,
        state: &mut dyn StateAccess,
        height: u64,
    ) -> Result<(), StateError> {
        let due: Vec<(Vec<u8>, RequestId)> = {
            let mut out = Vec::new();
            for item in state.prefix_scan(keys::SERVICE_EXPIRATION_QUEUE_PREFIX)? {
                let (key, _) = item?;
                let Some((entry_height, request_id)) = keys::parse_expiration_queue_key(&key)
                else {
                    return Err(StateError::Decode(format!(
                        "malformed expiration queue key {}",
                        hex_key(&key)
                    )));
                };
                if entry_height > height {
                    break;
                }
                out.push((key.to_vec(), request_id));
            }
            out
        };

        for (queue_key, request_id) in due {
            state.delete(&queue_key)?;
            let request: Option<CompactRequest> =
                get_typed(&*state, &keys::active_request_key(&request_id))?;
            let Some(request) = request else {
                // Already resolved; resolution deletes its queue entry, so
                // this only happens for entries written twice in one block.
                log::debug!("expiration entry for resolved request {}", request_id);
                continue;
            };
            self.expire_request(state, &request_id, request, height)?;
        }
        Ok(())
    }

    /// Expires one unanswered request: deletes the pending record, penalizes
    /// the provider, returns the escrowed fee to the consumer, and finalizes
    /// the batch once nothing remains outstanding.
    fn expire_request(
        &self,
        state: &mut dyn StateAccess,
        request_id: &RequestId,
        request: CompactRequest,
        height: u64,
    ) -> Result<(), StateError> {
        let context_id = request.request_context_id;
        let mut context = self
            .get_request_context(&*state, &context_id)?
            .ok_or_else(|| {
                StateError::Apply(format!(
                    "pending request {} references missing context {}",
                    request_id, context_id
                ))
            })?;

        state.delete(&keys::active_request_key(request_id))?;
        state.delete(&keys::batch_request_key(
            &context_id,
            request.batch_counter,
            &request.provider,
        ))?;

        self.penalize_missed_response(state, &context.service_name, &request.provider, height)?;
        if request.service_fee > 0 {
            self.add_returned_fee(state, &request.consumer, request.service_fee)?;
        }

        // An expiry counts toward the response tally only until the threshold
        // is met; with threshold zero every provider is waited for and every
        // expiry counts as a non-answer.
        if context.response_threshold == 0
            || context.batch_response_count < context.response_threshold
        {
            context.batch_response_count += 1;
        }
        log::debug!(
            "request {} of context {} expired at height {}",
            request_id,
            context_id,
            height
        );

        if self.batch_outstanding(&*state, &context_id, request.batch_counter)? == 0 {
            self.finalize_batch(state, &context_id, &mut context, height)?;
        }
        self.put_context(state, &context_id, &context)?;
        Ok(())
    }

    /// Slashes and tallies a provider that let a request expire, auto-disabling
    /// the binding when it crosses the miss threshold or falls below its
    /// minimum deposit.
    fn penalize_missed_response(
        &self,
        state: &mut dyn StateAccess,
        service_name: &str,
        provider: &AccountId,
        height: u64,
    ) -> Result<(), StateError> {
        let mut binding = self
            .get_binding(&*state, service_name, provider)?
            .ok_or_else(|| {
                StateError::Apply(format!(
                    "request issued against missing binding ({}, {})",
                    service_name, provider
                ))
            })?;

        binding.missed_count += 1;
        let slash = binding
            .deposit
            .saturating_mul(self.params.slash_fraction_bp as u128)
            / 10_000;
        if slash > 0 {
            self.bank
                .burn_from_module(state, MODULE_NAME, slash)
                .map_err(|e| StateError::Apply(e.to_string()))?;
            binding.deposit -= slash;
        }

        let required = self.min_deposit(&binding.pricing);
        if binding.available
            && (binding.missed_count >= self.params.slash_threshold || binding.deposit < required)
        {
            binding.available = false;
            binding.disabled_at = height;
            log::warn!(
                "binding ({}, {}) auto-disabled after {} missed responses (deposit {})",
                service_name,
                provider,
                binding.missed_count,
                binding.deposit
            );
        }
        self.put_binding(state, &binding)?;
        Ok(())
    }

    /// Closes the current batch, dispatches the owning module's callback, and
    /// either schedules the next run or completes the context.
    pub(crate) fn finalize_batch(
        &self,
        state: &mut dyn StateAccess,
        context_id: &RequestContextId,
        context: &mut RequestContext,
        height: u64,
    ) -> Result<(), StateError> {
        context.batch_state = BatchState::BatchCompleted;
        if !context.module_name.is_empty() {
            self.dispatch_callback(state, context_id, context, height)?;
        }

        if !context.repeated {
            context.state = ContextState::Completed;
            log::debug!("request context {} completed", context_id);
            return Ok(());
        }

        if context.repeated_total > 0 {
            context.repeated_total -= 1;
        }
        if context.repeated_total == 0 {
            context.state = ContextState::Completed;
            log::debug!("request context {} exhausted its run count", context_id);
        } else if context.state == ContextState::Running {
            // Frequency >= timeout guarantees this is in the future except
            // when the batch finalized late; then the next run starts now.
            // Saturates: a frequency near u64::MAX means "never again", not
            // a wrapped height in the past.
            let next = context
                .batch_start_height
                .saturating_add(context.repeated_frequency)
                .max(height);
            self.schedule_batch(state, context_id, context, next)?;
            log::debug!(
                "request context {}: next batch scheduled at height {}",
                context_id,
                next
            );
        }
        Ok(())
    }

    /// Builds every batch whose scheduled height has been reached.
    ///
    /// Entries superseded by a pause, kill, or reschedule are skipped and
    /// discarded. A consumer that cannot cover the fee escrow pauses the
    /// context rather than failing the block.
    pub(crate) fn process_scheduled_batches(
        &self,
        state: &mut dyn StateAccess,
        height: u64,
    ) -> Result<(), StateError> {
        let due: Vec<(Vec<u8>, u64, RequestContextId)> = {
            let mut out = Vec::new();
            for item in state.prefix_scan(keys::SERVICE_NEW_BATCH_QUEUE_PREFIX)? {
                let (key, _) = item?;
                let Some((entry_height, context_id)) = keys::parse_new_batch_queue_key(&key)
                else {
                    return Err(StateError::Decode(format!(
                        "malformed new-batch queue key {}",
                        hex_key(&key)
                    )));
                };
                if entry_height > height {
                    break;
                }
                out.push((key.to_vec(), entry_height, context_id));
            }
            out
        };

        for (queue_key, entry_height, context_id) in due {
            state.delete(&queue_key)?;
            let mut context = self
                .get_request_context(&*state, &context_id)?
                .ok_or_else(|| {
                    StateError::Apply(format!(
                        "scheduled batch references missing context {}",
                        context_id
                    ))
                })?;
            if context.state != ContextState::Running
                || context.batch_state != BatchState::BatchCompleted
                || context.next_batch_height != entry_height
            {
                log::debug!(
                    "request context {}: stale batch entry at height {} skipped",
                    context_id,
                    entry_height
                );
                continue;
            }

            match self.build_batch(state, &context_id, &mut context, height) {
                Ok(()) => {}
                Err(TransactionError::InsufficientFunds) => {
                    context.state = ContextState::Paused;
                    context.next_batch_height = 0;
                    log::warn!(
                        "request context {} paused: consumer {} cannot cover the batch fee escrow",
                        context_id,
                        context.consumer
                    );
                }
                Err(TransactionError::State(e)) => return Err(e),
                Err(e) => return Err(StateError::Apply(e.to_string())),
            }
            self.put_context(state, &context_id, &context)?;
        }
        Ok(())
    }
}

fn hex_key(key: &[u8]) -> String {
    key.iter().map(|b| format!("{:02x}", b)).collect()
}
