use std::str::FromStr;

use config::{Config, ConfigError, File};
use ethers::types::Address;
use serde::Deserialize;

use crate::models::sale_errors::SaleError;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    pub network: String,
    pub explorer_url: String,
    pub usdt_address: String,
    pub usdc_address: String,
    pub deployer_address: String,
    pub deployer_nonce: u64,
    pub snapshot_path: Option<String>,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/demi_sale.log")?
        .set_default("network", "amoy")?
        .set_default("explorer_url", "https://amoy.polygonscan.com")?
        // Polygon PoS USDT / USDC (PoS bridged)
        .set_default("usdt_address", "0xc2132D05D31c914a87C6611C10748AEb04B58e8F")?
        .set_default("usdc_address", "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174")?
        // First local development account
        .set_default("deployer_address", "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")?
        .set_default("deployer_nonce", 0)?
        // Add configuration from a file
        .add_source(File::with_name("config/config").required(false))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("APP"))
        .build()?;

    s.try_deserialize()
}

fn parse_address(field: &str, value: &str) -> Result<Address, SaleError> {
    Address::from_str(value)
        .map_err(|e| SaleError::InvalidArgument(format!("{} {:?}: {}", field, value, e)))
}

impl AppConfig {
    pub fn usdt(&self) -> Result<Address, SaleError> {
        parse_address("usdt_address", &self.usdt_address)
    }

    pub fn usdc(&self) -> Result<Address, SaleError> {
        parse_address("usdc_address", &self.usdc_address)
    }

    pub fn deployer(&self) -> Result<Address, SaleError> {
        parse_address("deployer_address", &self.deployer_address)
    }

    /// Block explorer page for `address`
    pub fn explorer_link(&self, address: Address) -> String {
        format!("{}/address/{:?}", self.explorer_url.trim_end_matches('/'), address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let config = load_config().expect("defaults should load");
        assert_eq!(config.network, "amoy");
        assert_eq!(
            config.usdt().unwrap(),
            Address::from_str("0xc2132D05D31c914a87C6611C10748AEb04B58e8F").unwrap()
        );
        assert_ne!(config.usdt().unwrap(), config.usdc().unwrap());
    }

    #[test]
    fn test_bad_address_rejected() {
        let mut config = load_config().unwrap();
        config.usdc_address = "not-an-address".to_string();
        assert!(matches!(config.usdc(), Err(SaleError::InvalidArgument(_))));
    }

    #[test]
    fn test_explorer_link() {
        let mut config = load_config().unwrap();
        config.explorer_url = "https://amoy.polygonscan.com/".to_string();
        assert_eq!(
            config.explorer_link(Address::zero()),
            "https://amoy.polygonscan.com/address/0x0000000000000000000000000000000000000000"
        );
    }
}
