// Path: crates/api/src/bank.rs
//! The bank capability consumed by modules that move funds.
//!
//! The account/balance ledger itself is outside this workspace; modules see
//! only this interface. Module escrow accounts are addressed by module name
//! and hold funds pending settlement (binding deposits, batch fee escrow).

use crate::state::StateAccess;
use meridian_types::app::AccountId;
use meridian_types::error::{StateError, TransactionError};

/// Balance reads and conditional transfers against the account ledger.
pub trait BankKeeper: Send + Sync {
    /// Returns the spendable balance of an account.
    fn balance_of(&self, state: &dyn StateAccess, account: &AccountId)
        -> Result<u128, StateError>;

    /// Transfers between two user accounts. Fails with `InsufficientFunds`
    /// without mutating state if the sender cannot cover the amount.
    fn transfer(
        &self,
        state: &mut dyn StateAccess,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), TransactionError>;

    /// Moves funds from a user account into a module escrow account.
    fn send_to_module(
        &self,
        state: &mut dyn StateAccess,
        from: &AccountId,
        module: &str,
        amount: u128,
    ) -> Result<(), TransactionError>;

    /// Moves funds from a module escrow account to a user account.
    fn send_from_module(
        &self,
        state: &mut dyn StateAccess,
        module: &str,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), TransactionError>;

    /// Destroys funds held by a module escrow account (deposit slashing).
    fn burn_from_module(
        &self,
        state: &mut dyn StateAccess,
        module: &str,
        amount: u128,
    ) -> Result<(), TransactionError>;
}
