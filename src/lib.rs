pub mod configure;
pub mod currency;
pub mod ledger;
pub mod logger;
pub mod models;
pub mod service;
pub mod user_account;

pub use currency::{CurrencyError, MockStablecoin, StableCurrency};
pub use ledger::{SaleLedger, SaleListener, Snapshot};
pub use models::{SaleError, SaleEvent};
pub use service::SaleService;
