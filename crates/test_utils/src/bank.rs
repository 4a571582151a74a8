// Path: crates/test_utils/src/bank.rs
//! A state-backed `BankKeeper` fixture.
//!
//! Balances live in the same state store as module records, so escrow
//! conservation can be asserted across message and tick boundaries.

use meridian_api::bank::BankKeeper;
use meridian_api::state::StateAccess;
use meridian_types::app::AccountId;
use meridian_types::codec;
use meridian_types::error::{StateError, TransactionError};
use meridian_types::keys;

/// A minimal balance ledger storing `u128` amounts under `bank::` keys.
#[derive(Debug, Clone, Default)]
pub struct StateBank;

impl StateBank {
    /// Creates the fixture.
    pub fn new() -> Self {
        Self
    }

    /// Credits an account out of thin air. Test setup only.
    pub fn mint(
        &self,
        state: &mut dyn StateAccess,
        account: &AccountId,
        amount: u128,
    ) -> Result<(), TransactionError> {
        let key = keys::balance_key(account);
        let balance = read_amount(state, &key)?;
        let balance = balance
            .checked_add(amount)
            .ok_or(TransactionError::BalanceOverflow)?;
        write_amount(state, &key, balance)?;
        Ok(())
    }

    /// Returns a module escrow account's balance.
    pub fn module_balance(
        &self,
        state: &dyn StateAccess,
        module: &str,
    ) -> Result<u128, StateError> {
        read_amount_state(state, &keys::module_balance_key(module))
    }

    fn move_amount(
        &self,
        state: &mut dyn StateAccess,
        from_key: &[u8],
        to_key: &[u8],
        amount: u128,
    ) -> Result<(), TransactionError> {
        if amount == 0 {
            return Ok(());
        }
        let from_balance = read_amount(state, from_key)?;
        let from_balance = from_balance
            .checked_sub(amount)
            .ok_or(TransactionError::InsufficientFunds)?;
        let to_balance = read_amount(state, to_key)?
            .checked_add(amount)
            .ok_or(TransactionError::BalanceOverflow)?;
        write_amount(state, from_key, from_balance)?;
        write_amount(state, to_key, to_balance)?;
        Ok(())
    }
}

fn read_amount_state(state: &dyn StateAccess, key: &[u8]) -> Result<u128, StateError> {
    match state.get(key)? {
        Some(bytes) => codec::from_bytes_canonical(&bytes).map_err(StateError::Decode),
        None => Ok(0),
    }
}

fn read_amount(state: &dyn StateAccess, key: &[u8]) -> Result<u128, TransactionError> {
    Ok(read_amount_state(state, key)?)
}

fn write_amount(
    state: &mut dyn StateAccess,
    key: &[u8],
    amount: u128,
) -> Result<(), TransactionError> {
    let bytes = codec::to_bytes_canonical(&amount).map_err(TransactionError::Serialization)?;
    state.insert(key, &bytes)?;
    Ok(())
}

impl BankKeeper for StateBank {
    fn balance_of(
        &self,
        state: &dyn StateAccess,
        account: &AccountId,
    ) -> Result<u128, StateError> {
        read_amount_state(state, &keys::balance_key(account))
    }

    fn transfer(
        &self,
        state: &mut dyn StateAccess,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), TransactionError> {
        self.move_amount(state, &keys::balance_key(from), &keys::balance_key(to), amount)
    }

    fn send_to_module(
        &self,
        state: &mut dyn StateAccess,
        from: &AccountId,
        module: &str,
        amount: u128,
    ) -> Result<(), TransactionError> {
        self.move_amount(
            state,
            &keys::balance_key(from),
            &keys::module_balance_key(module),
            amount,
        )
    }

    fn send_from_module(
        &self,
        state: &mut dyn StateAccess,
        module: &str,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), TransactionError> {
        self.move_amount(
            state,
            &keys::module_balance_key(module),
            &keys::balance_key(to),
            amount,
        )
    }

    fn burn_from_module(
        &self,
        state: &mut dyn StateAccess,
        module: &str,
        amount: u128,
    ) -> Result<(), TransactionError> {
        if amount == 0 {
            return Ok(());
        }
        let key = keys::module_balance_key(module);
        let balance = read_amount(state, &key)?;
        let balance = balance
            .checked_sub(amount)
            .ok_or(TransactionError::InsufficientFunds)?;
        write_amount(state, &key, balance)
    }
}
