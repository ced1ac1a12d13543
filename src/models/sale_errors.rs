// Error types for the DEMI sale ledger
use std::fmt;

use ethers::types::{Address, U256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaleError {
    // Validation errors
    InvalidArgument(String),
    ArithmeticOverflow(&'static str),

    // Permission errors
    Unauthorized { caller: Address },

    // Purchase path
    SaleInactive,
    UnsupportedCurrency(Address),
    InsufficientSupply { available: U256, required: U256 },
    CurrencyTransferFailed { currency: Address, reason: String },

    // Withdrawal path
    InsufficientProceeds { currency: Address, available: U256, required: U256 },

    // Token holder errors
    InsufficientBalance { account: Address, available: U256, required: U256 },
    InsufficientAllowance { owner: Address, spender: Address, available: U256, required: U256 },
}

impl fmt::Display for SaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::ArithmeticOverflow(context) => write!(f, "Arithmetic overflow in {}", context),
            Self::Unauthorized { caller } => write!(f, "Caller {:?} is not the owner", caller),
            Self::SaleInactive => write!(f, "Sale is not active"),
            Self::UnsupportedCurrency(currency) => {
                write!(f, "Currency {:?} is not accepted", currency)
            }
            Self::InsufficientSupply { available, required } => {
                write!(f, "Insufficient supply: have {}, need {}", available, required)
            }
            Self::CurrencyTransferFailed { currency, reason } => {
                write!(f, "Transfer of currency {:?} failed: {}", currency, reason)
            }
            Self::InsufficientProceeds { currency, available, required } => {
                write!(
                    f,
                    "Insufficient proceeds of {:?}: have {}, need {}",
                    currency, available, required
                )
            }
            Self::InsufficientBalance { account, available, required } => {
                write!(
                    f,
                    "Insufficient balance for {:?}: have {}, need {}",
                    account, available, required
                )
            }
            Self::InsufficientAllowance { owner, spender, available, required } => {
                write!(
                    f,
                    "Insufficient allowance from {:?} to {:?}: have {}, need {}",
                    owner, spender, available, required
                )
            }
        }
    }
}

impl std::error::Error for SaleError {}

// Error code mapping for CLI / log output
impl SaleError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::ArithmeticOverflow(_) => "ARITHMETIC_OVERFLOW",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::SaleInactive => "SALE_INACTIVE",
            Self::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            Self::InsufficientSupply { .. } => "INSUFFICIENT_SUPPLY",
            Self::CurrencyTransferFailed { .. } => "CURRENCY_TRANSFER_FAILED",
            Self::InsufficientProceeds { .. } => "INSUFFICIENT_PROCEEDS",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
        }
    }

    /// Every rejection leaves the ledger operable; this only separates caller
    /// mistakes from conditions the caller cannot fix by changing the request.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::ArithmeticOverflow(_) | Self::SaleInactive | Self::InsufficientSupply { .. }
        )
    }
}
