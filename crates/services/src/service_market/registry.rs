// Path: crates/services/src/service_market/registry.rs
//! Service definitions and provider bindings.

use super::{
    BindServiceParams, DefineServiceParams, EnableBindingParams, ServiceModule,
    SetWithdrawAddressParams, UpdateBindingParams, MODULE_NAME,
};
use crate::store::{get_typed, put_typed};
use meridian_api::state::StateAccess;
use meridian_api::transaction::context::TxContext;
use meridian_types::app::service::{Pricing, ServiceBinding, ServiceDefinition};
use meridian_types::app::AccountId;
use meridian_types::error::{ServiceError, StateError, TransactionError};
use meridian_types::keys;

const MAX_NAME_LEN: usize = 70;

fn validate_service_name(name: &str) -> Result<(), ServiceError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ServiceError::InvalidDefinition(format!(
            "name must be 1..={} bytes",
            MAX_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ServiceError::InvalidDefinition(
            "name may contain only alphanumerics, '-', and '_'".into(),
        ));
    }
    Ok(())
}

impl ServiceModule {
    pub(crate) fn min_deposit(&self, pricing: &Pricing) -> u128 {
        pricing.min_deposit(self.params.min_deposit_multiple)
    }

    /// Returns a service definition, if one exists.
    pub fn get_definition(
        &self,
        state: &dyn StateAccess,
        name: &str,
    ) -> Result<Option<ServiceDefinition>, StateError> {
        get_typed(state, &keys::service_definition_key(name))
    }

    /// Returns a provider's binding for a service, if one exists.
    pub fn get_binding(
        &self,
        state: &dyn StateAccess,
        service: &str,
        provider: &AccountId,
    ) -> Result<Option<ServiceBinding>, StateError> {
        get_typed(state, &keys::service_binding_key(service, provider))
    }

    pub(crate) fn put_binding(
        &self,
        state: &mut dyn StateAccess,
        binding: &ServiceBinding,
    ) -> Result<(), StateError> {
        put_typed(
            state,
            &keys::service_binding_key(&binding.service_name, &binding.provider),
            binding,
        )
    }

    /// Registers an immutable service definition under a unique name.
    pub fn define_service(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: DefineServiceParams,
    ) -> Result<(), TransactionError> {
        validate_service_name(&params.name)?;
        if self.get_definition(&*state, &params.name)?.is_some() {
            return Err(ServiceError::DuplicateService(params.name).into());
        }

        let definition = ServiceDefinition {
            name: params.name,
            description: params.description,
            tags: params.tags,
            author: ctx.signer_account_id,
            schemas: params.schemas,
        };
        put_typed(
            state,
            &keys::service_definition_key(&definition.name),
            &definition,
        )?;
        log::info!(
            "service '{}' defined by {}",
            definition.name,
            definition.author
        );
        Ok(())
    }

    /// Binds the signer as a provider of a service, escrowing the deposit.
    pub fn bind_service(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: BindServiceParams,
    ) -> Result<(), TransactionError> {
        let provider = ctx.signer_account_id;
        if self.get_definition(&*state, &params.service_name)?.is_none() {
            return Err(ServiceError::UnknownService(params.service_name).into());
        }
        if self
            .get_binding(&*state, &params.service_name, &provider)?
            .is_some()
        {
            return Err(ServiceError::DuplicateBinding {
                service: params.service_name,
                provider,
            }
            .into());
        }

        let required = self.min_deposit(&params.pricing);
        if params.deposit < required {
            return Err(ServiceError::InsufficientDeposit {
                required,
                got: params.deposit,
            }
            .into());
        }
        self.bank
            .send_to_module(state, &provider, MODULE_NAME, params.deposit)?;

        let binding = ServiceBinding {
            service_name: params.service_name,
            provider,
            deposit: params.deposit,
            pricing: params.pricing,
            withdraw_address: provider,
            available: true,
            disabled_at: 0,
            missed_count: 0,
        };
        self.put_binding(state, &binding)?;
        log::info!(
            "provider {} bound to service '{}' with deposit {}",
            provider,
            binding.service_name,
            binding.deposit
        );
        Ok(())
    }

    /// Adds deposit and/or replaces the pricing of an existing binding.
    ///
    /// Availability is re-derived from the new deposit and pricing: a binding
    /// that clears the minimum again becomes available, one that no longer
    /// does is disabled.
    pub fn update_binding(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: UpdateBindingParams,
    ) -> Result<(), TransactionError> {
        let provider = ctx.signer_account_id;
        let mut binding = self
            .get_binding(&*state, &params.service_name, &provider)?
            .ok_or(ServiceError::UnknownBinding {
                service: params.service_name.clone(),
                provider,
            })?;

        if params.added_deposit > 0 {
            self.bank
                .send_to_module(state, &provider, MODULE_NAME, params.added_deposit)?;
            binding.deposit = binding
                .deposit
                .checked_add(params.added_deposit)
                .ok_or(TransactionError::BalanceOverflow)?;
        }
        if let Some(pricing) = params.pricing {
            binding.pricing = pricing;
        }

        let required = self.min_deposit(&binding.pricing);
        if binding.available && binding.deposit < required {
            binding.available = false;
            binding.disabled_at = ctx.block_height;
            log::warn!(
                "binding ({}, {}) disabled: deposit {} fell below minimum {}",
                binding.service_name,
                provider,
                binding.deposit,
                required
            );
        } else if !binding.available && binding.deposit >= required {
            binding.available = true;
            binding.disabled_at = 0;
            binding.missed_count = 0;
            log::info!(
                "binding ({}, {}) re-enabled by deposit top-up",
                binding.service_name,
                provider
            );
        }

        self.put_binding(state, &binding)?;
        Ok(())
    }

    /// Changes where deposit refunds for the signer's binding are sent.
    pub fn set_withdraw_address(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: SetWithdrawAddressParams,
    ) -> Result<(), TransactionError> {
        let provider = ctx.signer_account_id;
        let mut binding = self
            .get_binding(&*state, &params.service_name, &provider)?
            .ok_or(ServiceError::UnknownBinding {
                service: params.service_name,
                provider,
            })?;
        binding.withdraw_address = params.withdraw_address;
        self.put_binding(state, &binding)?;
        Ok(())
    }

    /// Voluntarily removes the signer's binding from batch building.
    pub fn disable_binding(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        service_name: &str,
    ) -> Result<(), TransactionError> {
        let provider = ctx.signer_account_id;
        let mut binding = self
            .get_binding(&*state, service_name, &provider)?
            .ok_or_else(|| ServiceError::UnknownBinding {
                service: service_name.to_string(),
                provider,
            })?;
        if !binding.available {
            return Err(ServiceError::AlreadyDisabled.into());
        }
        binding.available = false;
        binding.disabled_at = ctx.block_height;
        self.put_binding(state, &binding)?;
        log::info!("binding ({}, {}) disabled", service_name, provider);
        Ok(())
    }

    /// Re-enables a disabled binding, optionally topping up the deposit first.
    /// The deposit must clear the pricing-derived minimum.
    pub fn enable_binding(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        params: EnableBindingParams,
    ) -> Result<(), TransactionError> {
        let provider = ctx.signer_account_id;
        let mut binding = self
            .get_binding(&*state, &params.service_name, &provider)?
            .ok_or(ServiceError::UnknownBinding {
                service: params.service_name.clone(),
                provider,
            })?;
        if binding.available {
            return Err(ServiceError::AlreadyAvailable.into());
        }

        if params.added_deposit > 0 {
            self.bank
                .send_to_module(state, &provider, MODULE_NAME, params.added_deposit)?;
            binding.deposit = binding
                .deposit
                .checked_add(params.added_deposit)
                .ok_or(TransactionError::BalanceOverflow)?;
        }
        let required = self.min_deposit(&binding.pricing);
        if binding.deposit < required {
            return Err(ServiceError::InsufficientDeposit {
                required,
                got: binding.deposit,
            }
            .into());
        }

        binding.available = true;
        binding.disabled_at = 0;
        binding.missed_count = 0;
        self.put_binding(state, &binding)?;
        log::info!("binding ({}, {}) enabled", params.service_name, provider);
        Ok(())
    }

    /// Refunds the whole remaining deposit to the binding's withdraw address.
    /// Allowed only once the binding has been disabled for the configured
    /// cool-down, so outstanding requests it may still owe can expire first.
    pub fn refund_deposit(
        &self,
        state: &mut dyn StateAccess,
        ctx: &TxContext,
        service_name: &str,
    ) -> Result<(), TransactionError> {
        let provider = ctx.signer_account_id;
        let mut binding = self
            .get_binding(&*state, service_name, &provider)?
            .ok_or_else(|| ServiceError::UnknownBinding {
                service: service_name.to_string(),
                provider,
            })?;
        if binding.available {
            return Err(ServiceError::StillAvailable.into());
        }
        let refundable_at = binding
            .disabled_at
            .saturating_add(self.params.deposit_refund_delay);
        if ctx.block_height < refundable_at {
            return Err(ServiceError::CooldownNotElapsed { refundable_at }.into());
        }

        let amount = binding.deposit;
        if amount > 0 {
            self.bank
                .send_from_module(state, MODULE_NAME, &binding.withdraw_address, amount)?;
            binding.deposit = 0;
            self.put_binding(state, &binding)?;
        }
        log::info!(
            "deposit of binding ({}, {}) refunded: {} to {}",
            service_name,
            provider,
            amount,
            binding.withdraw_address
        );
        Ok(())
    }
}
