pub use sale_errors::*;
pub use sale_events::*;

pub mod price_conversion;
pub mod sale_errors;
pub mod sale_events;
