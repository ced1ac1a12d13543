//! In-memory stablecoin for tests and local simulation
//!
//! Tracks balances and allowances like an ERC20 contract, and can be switched
//! into a rejecting mode to exercise failure paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ethers::types::{Address, U256};

use super::traits::{CurrencyError, StableCurrency};

#[derive(Default)]
struct MockState {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    rejecting: Option<String>,
}

/// Mock ERC20 stablecoin
pub struct MockStablecoin {
    address: Address,
    symbol: String,
    decimals: u32,
    state: Mutex<MockState>,
}

impl MockStablecoin {
    pub fn new(address: Address, symbol: &str, decimals: u32) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            decimals,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credit `amount` to `account` out of thin air
    pub fn mint(&self, account: Address, amount: U256) {
        let mut state = self.state();
        let balance = state.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// `owner` allows `spender` to move up to `amount`
    pub fn approve(&self, owner: Address, spender: Address, amount: U256) {
        self.state().allowances.insert((owner, spender), amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state().allowances.get(&(owner, spender)).copied().unwrap_or_default()
    }

    /// Reject every transfer with `reason` until cleared with `None`
    pub fn set_rejecting(&self, reason: Option<&str>) {
        self.state().rejecting = reason.map(str::to_string);
    }

    fn move_funds(
        state: &mut MockState,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), CurrencyError> {
        let available = state.balances.get(&from).copied().unwrap_or_default();
        if available < amount {
            return Err(CurrencyError::InsufficientBalance { available, required: amount });
        }
        state.balances.insert(from, available - amount);
        let to_balance = state.balances.entry(to).or_default();
        *to_balance = to_balance.saturating_add(amount);
        Ok(())
    }
}

impl StableCurrency for MockStablecoin {
    fn address(&self) -> Address {
        self.address
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn decimals(&self) -> u32 {
        self.decimals
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.state().balances.get(&account).copied().unwrap_or_default()
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), CurrencyError> {
        log::debug!("[{}] transfer({:?} -> {:?}, amount={})", self.symbol, from, to, amount);
        let mut state = self.state();
        if let Some(reason) = &state.rejecting {
            return Err(CurrencyError::Rejected(reason.clone()));
        }
        Self::move_funds(&mut state, from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), CurrencyError> {
        log::debug!(
            "[{}] transfer_from(spender={:?}, {:?} -> {:?}, amount={})",
            self.symbol,
            spender,
            owner,
            recipient,
            amount
        );
        let mut state = self.state();
        if let Some(reason) = &state.rejecting {
            return Err(CurrencyError::Rejected(reason.clone()));
        }

        let allowed = state.allowances.get(&(owner, spender)).copied().unwrap_or_default();
        if allowed < amount {
            return Err(CurrencyError::InsufficientAllowance { available: allowed, required: amount });
        }
        Self::move_funds(&mut state, owner, recipient, amount)?;
        state.allowances.insert((owner, spender), allowed - amount);
        Ok(())
    }
}
