//! Serialized access to one sale ledger
//!
//! Every call takes the ledger lock for its whole duration, so operations
//! from any number of threads apply one at a time in a single total order.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ethers::types::{Address, U256};

use crate::ledger::{SaleLedger, SaleListener};
use crate::models::sale_errors::SaleError;
use crate::models::sale_events::SaleEvent;
use crate::user_account::AccountId;

pub struct SaleService {
    ledger: Mutex<SaleLedger>,
}

impl SaleService {
    pub fn new(ledger: SaleLedger) -> Self {
        Self { ledger: Mutex::new(ledger) }
    }

    // Ledger operations never panic mid-mutation, so a poisoned lock still
    // guards a consistent ledger.
    fn lock(&self) -> MutexGuard<'_, SaleLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the ledger under the lock
    pub fn with_ledger<R>(&self, f: impl FnOnce(&SaleLedger) -> R) -> R {
        let guard = self.lock();
        f(&*guard)
    }

    pub fn into_inner(self) -> SaleLedger {
        self.ledger.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_listener(&self, listener: Box<dyn SaleListener>) {
        self.lock().set_listener(listener);
    }

    pub fn buy(&self, caller: AccountId, currency: Address, pay_amount: U256) -> Result<U256, SaleError> {
        self.lock().buy(caller, currency, pay_amount)
    }

    pub fn set_token_price(&self, caller: AccountId, new_price: U256) -> Result<(), SaleError> {
        self.lock().set_token_price(caller, new_price)
    }

    pub fn set_sale_active(&self, caller: AccountId, active: bool) -> Result<(), SaleError> {
        self.lock().set_sale_active(caller, active)
    }

    pub fn withdraw_proceeds(
        &self,
        caller: AccountId,
        currency: Address,
        amount: U256,
    ) -> Result<(), SaleError> {
        self.lock().withdraw_proceeds(caller, currency, amount)
    }

    pub fn withdraw_tokens(&self, caller: AccountId, to: AccountId, amount: U256) -> Result<(), SaleError> {
        self.lock().withdraw_tokens(caller, to, amount)
    }

    pub fn transfer_ownership(&self, caller: AccountId, new_owner: AccountId) -> Result<(), SaleError> {
        self.lock().transfer_ownership(caller, new_owner)
    }

    pub fn transfer(&self, caller: AccountId, to: AccountId, amount: U256) -> Result<(), SaleError> {
        self.lock().transfer(caller, to, amount)
    }

    pub fn approve(&self, caller: AccountId, spender: AccountId, amount: U256) -> Result<(), SaleError> {
        self.lock().approve(caller, spender, amount)
    }

    pub fn transfer_from(
        &self,
        caller: AccountId,
        from: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<(), SaleError> {
        self.lock().transfer_from(caller, from, to, amount)
    }

    pub fn owner(&self) -> AccountId {
        self.lock().owner()
    }

    pub fn total_supply(&self) -> U256 {
        self.lock().total_supply()
    }

    pub fn balance_of(&self, account: AccountId) -> U256 {
        self.lock().balance_of(account)
    }

    pub fn token_price(&self) -> U256 {
        self.lock().token_price()
    }

    pub fn sale_active(&self) -> bool {
        self.lock().sale_active()
    }

    pub fn drain_events(&self) -> Vec<SaleEvent> {
        self.lock().drain_events()
    }
}
