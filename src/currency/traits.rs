//! Stablecoin collaborator trait
//!
//! Defines the slice of an ERC20 currency the sale ledger depends on.

use std::fmt;

use ethers::types::{Address, U256};

/// Business failure reported by a currency contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    InsufficientBalance { available: U256, required: U256 },
    InsufficientAllowance { available: U256, required: U256 },
    /// Currency refused the call for its own reasons (paused, blacklisted, ...)
    Rejected(String),
}

impl fmt::Display for CurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientBalance { available, required } => {
                write!(f, "insufficient balance: have {}, need {}", available, required)
            }
            Self::InsufficientAllowance { available, required } => {
                write!(f, "insufficient allowance: have {}, need {}", available, required)
            }
            Self::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

impl std::error::Error for CurrencyError {}

/// External stable-value currency (USDT / USDC equivalent)
///
/// Implementations must apply each transfer entirely or not at all.
pub trait StableCurrency: Send + Sync {
    /// Contract address identifying this currency
    fn address(&self) -> Address;

    /// Ticker, for logging
    fn symbol(&self) -> &str;

    fn decimals(&self) -> u32;

    fn balance_of(&self, account: Address) -> U256;

    /// Move `amount` out of `from`'s own holdings (`from` is the caller)
    fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), CurrencyError>;

    /// Move `amount` from `owner` to `recipient`, spending `spender`'s allowance
    fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), CurrencyError>;
}
