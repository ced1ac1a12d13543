use ethers::types::{Address, U256};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::sale_errors::SaleError;

pub type AccountId = Address;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Balance {
    pub amount: U256,
    pub version: u64,
}

impl Balance {
    pub fn credit(&mut self, amount: U256) -> Result<(), &'static str> {
        self.amount = self.amount.checked_add(amount).ok_or("Balance overflow")?;
        self.version += 1;
        Ok(())
    }

    pub fn debit(&mut self, amount: U256) -> Result<(), &'static str> {
        if self.amount < amount {
            return Err("Insufficient funds");
        }
        self.amount -= amount;
        self.version += 1;
        Ok(())
    }
}

/// Token balance and allowance tables.
///
/// The full supply is minted once in [`BalanceTable::mint_all`]; afterwards
/// tokens only move between accounts, so the sum of balances always equals
/// `total_supply`.
#[derive(Debug, Clone)]
pub struct BalanceTable {
    total_supply: U256,
    balances: FxHashMap<AccountId, Balance>,
    allowances: FxHashMap<(AccountId, AccountId), U256>,
}

impl BalanceTable {
    pub fn mint_all(holder: AccountId, total_supply: U256) -> Self {
        let mut balances = FxHashMap::default();
        balances.insert(holder, Balance { amount: total_supply, version: 1 });
        Self { total_supply, balances, allowances: FxHashMap::default() }
    }

    /// Rebuild from persisted rows, rejecting rows that break the supply invariant.
    pub fn from_parts(
        total_supply: U256,
        balances: impl IntoIterator<Item = (AccountId, Balance)>,
        allowances: impl IntoIterator<Item = ((AccountId, AccountId), U256)>,
    ) -> Result<Self, SaleError> {
        let table = Self {
            total_supply,
            balances: balances.into_iter().collect(),
            allowances: allowances.into_iter().collect(),
        };
        match table.sum_balances() {
            Some(sum) if sum == total_supply => Ok(table),
            _ => Err(SaleError::InvalidArgument(
                "balances do not sum to total supply".to_string(),
            )),
        }
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: AccountId) -> U256 {
        self.balances.get(&account).map(|b| b.amount).unwrap_or_default()
    }

    pub fn version_of(&self, account: AccountId) -> u64 {
        self.balances.get(&account).map(|b| b.version).unwrap_or(0)
    }

    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> U256 {
        self.allowances.get(&(owner, spender)).copied().unwrap_or_default()
    }

    pub fn set_allowance(&mut self, owner: AccountId, spender: AccountId, amount: U256) {
        if amount.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
    }

    /// Move `amount` from `from` to `to`. Validates before touching either row.
    pub fn move_balance(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<(), SaleError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(SaleError::InsufficientBalance { account: from, available, required: amount });
        }
        if from == to {
            return Ok(());
        }
        // Receiver holds at most total_supply - available, so this cannot overflow
        self.balances
            .entry(to)
            .or_default()
            .credit(amount)
            .map_err(|_| SaleError::ArithmeticOverflow("balance credit"))?;
        self.balances
            .entry(from)
            .or_default()
            .debit(amount)
            .map_err(|_| SaleError::ArithmeticOverflow("balance debit"))?;
        Ok(())
    }

    /// None if the balances overflow 256 bits
    pub fn sum_balances(&self) -> Option<U256> {
        self.balances.values().try_fold(U256::zero(), |acc, b| acc.checked_add(b.amount))
    }

    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, &Balance)> {
        self.balances.iter().filter(|(_, b)| !b.amount.is_zero())
    }

    pub fn allowances(&self) -> impl Iterator<Item = (&(AccountId, AccountId), &U256)> {
        self.allowances.iter()
    }
}
