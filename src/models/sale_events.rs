use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Events committed by the sale ledger, in commit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SaleEvent {
    /// Token movement. Mint at deployment uses the zero address as `from`.
    Transfer { from: Address, to: Address, value: U256 },

    Approval { owner: Address, spender: Address, value: U256 },

    /// Buyer paid `pay_amount` of `currency` and received `tokens_received`
    Purchase { buyer: Address, currency: Address, pay_amount: U256, tokens_received: U256 },

    PriceChanged { old_price: U256, new_price: U256 },

    /// Emitted on every SetSaleActive call, including no-op ones
    SaleStatusChanged { active: bool },

    /// Collected stablecoin sent to the owner
    ProceedsWithdrawn { currency: Address, to: Address, amount: U256 },

    /// Unsold tokens released by the owner
    TokensWithdrawn { to: Address, amount: U256 },

    OwnershipTransferred { previous_owner: Address, new_owner: Address },
}

impl SaleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "Transfer",
            Self::Approval { .. } => "Approval",
            Self::Purchase { .. } => "Purchase",
            Self::PriceChanged { .. } => "PriceChanged",
            Self::SaleStatusChanged { .. } => "SaleStatusChanged",
            Self::ProceedsWithdrawn { .. } => "ProceedsWithdrawn",
            Self::TokensWithdrawn { .. } => "TokensWithdrawn",
            Self::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchase_event_json_serialization() {
        let event = SaleEvent::Purchase {
            buyer: Address::repeat_byte(0xb1),
            currency: Address::repeat_byte(0xc1),
            pay_amount: U256::from(1_000_000u64),
            tokens_received: U256::exp10(20),
        };

        let json = serde_json::to_string(&event).expect("Serialization failed");
        assert!(json.contains("\"event\":\"Purchase\""));

        let deserialized: SaleEvent = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(deserialized, event);
        assert_eq!(deserialized.name(), "Purchase");
    }

    #[test]
    fn test_status_event_name() {
        assert_eq!(SaleEvent::SaleStatusChanged { active: false }.name(), "SaleStatusChanged");
    }
}
