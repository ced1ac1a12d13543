//! Currency adapters - the stablecoins the sale accepts as payment

pub mod mock;
pub mod traits;

pub use mock::MockStablecoin;
pub use traits::{CurrencyError, StableCurrency};
