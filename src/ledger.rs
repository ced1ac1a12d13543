use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use ethers::types::{Address, U256, U512};
use ethers::utils::get_contract_address;
use serde::{Deserialize, Serialize};

// =================================================================
// 0. Module Import
// =================================================================
use crate::currency::StableCurrency;
use crate::models::price_conversion::{
    cost_for_tokens, tokens_for_payment, tokens_for_payment_wide, TOKEN_DECIMALS,
};
use crate::models::sale_errors::SaleError;
use crate::models::sale_events::SaleEvent;
use crate::user_account::{AccountId, Balance, BalanceTable};

// ==========================================
// 1. Token Constants
// ==========================================

pub const TOKEN_NAME: &str = "DEMI";
pub const TOKEN_SYMBOL: &str = "DEMI";
pub const TOTAL_SUPPLY_WHOLE_TOKENS: u64 = 3_300_000_000;
/// $0.01 per DEMI, in 6-decimal reference units
pub const INITIAL_TOKEN_PRICE: u64 = 10_000;

pub fn total_supply_units() -> U256 {
    U256::from(TOTAL_SUPPLY_WHOLE_TOKENS) * U256::exp10(TOKEN_DECIMALS as usize)
}

// ==========================================
// 2. Snapshot on disk
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRecord {
    pub owner: AccountId,
    pub spender: AccountId,
    pub amount: U256,
}

/// Persisted ledger state. Events are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub address: AccountId,
    pub owner: AccountId,
    pub usdt: Address,
    pub usdc: Address,
    pub token_price: U256,
    pub sale_active: bool,
    pub total_supply: U256,
    pub balances: Vec<(AccountId, Balance)>,
    pub allowances: Vec<AllowanceRecord>,
}

// ==========================================
// 3. Listener
// ==========================================

/// Receives each event after the operation that produced it has committed.
pub trait SaleListener: Send {
    fn on_event(&mut self, event: &SaleEvent) -> anyhow::Result<()>;
}

// ==========================================
// 4. Sale Ledger
// ==========================================

/// The DEMI token ledger and its fixed-price sale counter.
///
/// Every mutating operation validates all preconditions first and either
/// commits all of its effects or none of them. Inbound currency pulls happen
/// before any local mutation; outbound currency pushes happen with no local
/// mutation pending.
pub struct SaleLedger {
    address: AccountId,
    owner: AccountId,
    accounts: BalanceTable,
    usdt: Arc<dyn StableCurrency>,
    usdc: Arc<dyn StableCurrency>,
    token_price: U256,
    sale_active: bool,
    /// Events not yet delivered. Grows until `drain_events` unless a listener
    /// accepts them.
    events: Vec<SaleEvent>,
    listener: Option<Box<dyn SaleListener>>,
}

impl SaleLedger {
    /// Construct the ledger at `address`, deployed by `deployer`.
    pub fn new(
        deployer: AccountId,
        address: AccountId,
        usdt: Arc<dyn StableCurrency>,
        usdc: Arc<dyn StableCurrency>,
    ) -> Result<Self, SaleError> {
        Self::validate_wiring(deployer, address, usdt.address(), usdc.address())?;

        let total_supply = total_supply_units();
        let mut ledger = Self {
            address,
            owner: deployer,
            accounts: BalanceTable::mint_all(address, total_supply),
            usdt,
            usdc,
            token_price: U256::from(INITIAL_TOKEN_PRICE),
            sale_active: true,
            events: Vec::new(),
            listener: None,
        };

        log::info!(
            "[DEMI] deployed at {:?} by {:?}, supply={}, usdt={:?}, usdc={:?}",
            address,
            deployer,
            total_supply,
            ledger.usdt.address(),
            ledger.usdc.address()
        );
        ledger.emit(SaleEvent::Transfer { from: Address::zero(), to: address, value: total_supply });
        Ok(ledger)
    }

    /// Construct at the CREATE address of (`deployer`, `nonce`).
    pub fn deploy(
        deployer: AccountId,
        nonce: u64,
        usdt: Arc<dyn StableCurrency>,
        usdc: Arc<dyn StableCurrency>,
    ) -> Result<Self, SaleError> {
        let address = get_contract_address(deployer, nonce);
        Self::new(deployer, address, usdt, usdc)
    }

    fn validate_wiring(
        deployer: AccountId,
        address: AccountId,
        usdt: Address,
        usdc: Address,
    ) -> Result<(), SaleError> {
        if usdt.is_zero() || usdc.is_zero() {
            return Err(SaleError::InvalidArgument("currency address is zero".to_string()));
        }
        if usdt == usdc {
            return Err(SaleError::InvalidArgument("currency addresses are identical".to_string()));
        }
        if deployer.is_zero() || address.is_zero() {
            return Err(SaleError::InvalidArgument("deployer or contract address is zero".to_string()));
        }
        if address == usdt || address == usdc {
            return Err(SaleError::InvalidArgument(
                "contract address collides with a currency".to_string(),
            ));
        }
        Ok(())
    }

    /// Events the listener accepts are handed off instead of buffered.
    pub fn set_listener(&mut self, listener: Box<dyn SaleListener>) {
        self.listener = Some(listener);
    }

    // ------------------------------------------
    // Read operations
    // ------------------------------------------

    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn name(&self) -> &'static str {
        TOKEN_NAME
    }

    pub fn symbol(&self) -> &'static str {
        TOKEN_SYMBOL
    }

    pub fn decimals(&self) -> u32 {
        TOKEN_DECIMALS
    }

    pub fn total_supply(&self) -> U256 {
        self.accounts.total_supply()
    }

    pub fn balance_of(&self, account: AccountId) -> U256 {
        self.accounts.balance_of(account)
    }

    pub fn allowance(&self, owner: AccountId, spender: AccountId) -> U256 {
        self.accounts.allowance(owner, spender)
    }

    pub fn token_price(&self) -> U256 {
        self.token_price
    }

    pub fn sale_active(&self) -> bool {
        self.sale_active
    }

    /// [USDT, USDC]
    pub fn accepted_currencies(&self) -> [Address; 2] {
        [self.usdt.address(), self.usdc.address()]
    }

    /// Tokens still held by the contract and available for sale
    pub fn remaining_supply(&self) -> U256 {
        self.accounts.balance_of(self.address)
    }

    /// Tokens `pay_amount` of `currency` would buy at the current price
    pub fn quote_tokens(&self, currency: Address, pay_amount: U256) -> Result<U256, SaleError> {
        let token = self.currency(currency)?;
        tokens_for_payment(pay_amount, self.token_price, token.decimals())
    }

    /// Smallest payment in `currency` that buys at least `tokens`
    pub fn quote_cost(&self, currency: Address, tokens: U256) -> Result<U256, SaleError> {
        let token = self.currency(currency)?;
        cost_for_tokens(tokens, self.token_price, token.decimals())
    }

    pub fn events(&self) -> &[SaleEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<SaleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Sum of all balances equals total supply
    pub fn verify_supply(&self) -> bool {
        self.accounts.sum_balances() == Some(self.accounts.total_supply())
    }

    // ------------------------------------------
    // Purchase settlement
    // ------------------------------------------

    /// Buy tokens with `pay_amount` smallest units of `currency`.
    ///
    /// Returns the number of token units credited to `caller`.
    pub fn buy(
        &mut self,
        caller: AccountId,
        currency: Address,
        pay_amount: U256,
    ) -> Result<U256, SaleError> {
        self.try_buy(caller, currency, pay_amount).map_err(|e| {
            log::warn!("[DEMI] buy rejected: caller={:?} pay={} code={} ({})", caller, pay_amount, e.error_code(), e);
            e
        })
    }

    fn try_buy(
        &mut self,
        caller: AccountId,
        currency: Address,
        pay_amount: U256,
    ) -> Result<U256, SaleError> {
        // 1. Validate
        if !self.sale_active {
            return Err(SaleError::SaleInactive);
        }
        let token = self.currency(currency)?;
        if pay_amount.is_zero() {
            return Err(SaleError::InvalidArgument("payment amount is zero".to_string()));
        }
        if caller.is_zero() || caller == self.address {
            return Err(SaleError::InvalidArgument("invalid buyer".to_string()));
        }

        // 2. Compute
        let wide = tokens_for_payment_wide(pay_amount, self.token_price, token.decimals())?;
        if wide.is_zero() {
            return Err(SaleError::InvalidArgument("payment buys less than one token unit".to_string()));
        }
        let available = self.remaining_supply();
        if wide > U512::from(available) {
            // Amounts wider than 256 bits are reported as U256::MAX
            let required = U256::try_from(wide).unwrap_or(U256::MAX);
            return Err(SaleError::InsufficientSupply { available, required });
        }
        let tokens = U256::try_from(wide).map_err(|_| SaleError::ArithmeticOverflow("token amount"))?;

        // 3. Pull payment; nothing local has changed yet
        token.transfer_from(self.address, caller, self.address, pay_amount).map_err(|e| {
            log::error!("[DEMI] {} pull from {:?} failed: {}", token.symbol(), caller, e);
            SaleError::CurrencyTransferFailed { currency, reason: e.to_string() }
        })?;

        // 4. Settle. Supply was checked above and the buyer holds at most
        //    total_supply - available, so this move cannot fail.
        self.accounts.move_balance(self.address, caller, tokens)?;

        self.emit(SaleEvent::Transfer { from: self.address, to: caller, value: tokens });
        self.emit(SaleEvent::Purchase {
            buyer: caller,
            currency,
            pay_amount,
            tokens_received: tokens,
        });
        Ok(tokens)
    }

    // ------------------------------------------
    // Administrative controls
    // ------------------------------------------

    pub fn set_token_price(&mut self, caller: AccountId, new_price: U256) -> Result<(), SaleError> {
        self.ensure_owner(caller, "set_token_price")?;
        if new_price.is_zero() {
            return Err(SaleError::InvalidArgument("token price must be positive".to_string()));
        }

        let old_price = std::mem::replace(&mut self.token_price, new_price);
        self.emit(SaleEvent::PriceChanged { old_price, new_price });
        Ok(())
    }

    pub fn set_sale_active(&mut self, caller: AccountId, active: bool) -> Result<(), SaleError> {
        self.ensure_owner(caller, "set_sale_active")?;
        self.sale_active = active;
        self.emit(SaleEvent::SaleStatusChanged { active });
        Ok(())
    }

    /// Send `amount` of collected `currency` to the owner.
    pub fn withdraw_proceeds(
        &mut self,
        caller: AccountId,
        currency: Address,
        amount: U256,
    ) -> Result<(), SaleError> {
        self.ensure_owner(caller, "withdraw_proceeds")?;
        let token = self.currency(currency)?;
        if amount.is_zero() {
            return Err(SaleError::InvalidArgument("withdrawal amount is zero".to_string()));
        }

        let available = token.balance_of(self.address);
        if available < amount {
            return Err(SaleError::InsufficientProceeds { currency, available, required: amount });
        }

        let to = self.owner;
        token.transfer(self.address, to, amount).map_err(|e| {
            log::error!("[DEMI] {} withdrawal to {:?} failed: {}", token.symbol(), to, e);
            SaleError::CurrencyTransferFailed { currency, reason: e.to_string() }
        })?;

        self.emit(SaleEvent::ProceedsWithdrawn { currency, to, amount });
        Ok(())
    }

    /// Release unsold tokens from the contract's own balance.
    pub fn withdraw_tokens(
        &mut self,
        caller: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<(), SaleError> {
        self.ensure_owner(caller, "withdraw_tokens")?;
        if to.is_zero() || amount.is_zero() {
            return Err(SaleError::InvalidArgument("zero recipient or amount".to_string()));
        }
        let available = self.remaining_supply();
        if available < amount {
            return Err(SaleError::InsufficientSupply { available, required: amount });
        }

        self.accounts.move_balance(self.address, to, amount)?;
        self.emit(SaleEvent::Transfer { from: self.address, to, value: amount });
        self.emit(SaleEvent::TokensWithdrawn { to, amount });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: AccountId,
        new_owner: AccountId,
    ) -> Result<(), SaleError> {
        self.ensure_owner(caller, "transfer_ownership")?;
        if new_owner.is_zero() {
            return Err(SaleError::InvalidArgument("new owner is zero".to_string()));
        }

        let previous_owner = std::mem::replace(&mut self.owner, new_owner);
        self.emit(SaleEvent::OwnershipTransferred { previous_owner, new_owner });
        Ok(())
    }

    // ------------------------------------------
    // ERC20 holder operations
    // ------------------------------------------

    pub fn transfer(&mut self, caller: AccountId, to: AccountId, amount: U256) -> Result<(), SaleError> {
        if to.is_zero() {
            return Err(SaleError::InvalidArgument("transfer to zero address".to_string()));
        }
        self.accounts.move_balance(caller, to, amount)?;
        self.emit(SaleEvent::Transfer { from: caller, to, value: amount });
        Ok(())
    }

    pub fn approve(
        &mut self,
        caller: AccountId,
        spender: AccountId,
        amount: U256,
    ) -> Result<(), SaleError> {
        if spender.is_zero() {
            return Err(SaleError::InvalidArgument("approve to zero address".to_string()));
        }
        self.accounts.set_allowance(caller, spender, amount);
        self.emit(SaleEvent::Approval { owner: caller, spender, value: amount });
        Ok(())
    }

    /// Move `amount` from `from` to `to` on `caller`'s allowance.
    /// An allowance of `U256::MAX` is never decremented.
    pub fn transfer_from(
        &mut self,
        caller: AccountId,
        from: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<(), SaleError> {
        if to.is_zero() {
            return Err(SaleError::InvalidArgument("transfer to zero address".to_string()));
        }
        let allowed = self.accounts.allowance(from, caller);
        if allowed < amount {
            return Err(SaleError::InsufficientAllowance {
                owner: from,
                spender: caller,
                available: allowed,
                required: amount,
            });
        }

        self.accounts.move_balance(from, to, amount)?;
        if allowed != U256::MAX {
            self.accounts.set_allowance(from, caller, allowed - amount);
        }
        self.emit(SaleEvent::Transfer { from, to, value: amount });
        Ok(())
    }

    // ------------------------------------------
    // Snapshots
    // ------------------------------------------

    pub fn snapshot(&self) -> Snapshot {
        let mut balances: Vec<(AccountId, Balance)> =
            self.accounts.holders().map(|(account, balance)| (*account, *balance)).collect();
        balances.sort_by_key(|(account, _)| *account);

        let mut allowances: Vec<AllowanceRecord> = self
            .accounts
            .allowances()
            .map(|((owner, spender), amount)| AllowanceRecord {
                owner: *owner,
                spender: *spender,
                amount: *amount,
            })
            .collect();
        allowances.sort_by_key(|r| (r.owner, r.spender));

        Snapshot {
            address: self.address,
            owner: self.owner,
            usdt: self.usdt.address(),
            usdc: self.usdc.address(),
            token_price: self.token_price,
            sale_active: self.sale_active,
            total_supply: self.accounts.total_supply(),
            balances,
            allowances,
        }
    }

    /// Rebuild a ledger from `snapshot`, re-attaching the currency collaborators.
    pub fn from_snapshot(
        snapshot: Snapshot,
        usdt: Arc<dyn StableCurrency>,
        usdc: Arc<dyn StableCurrency>,
    ) -> Result<Self, SaleError> {
        if usdt.address() != snapshot.usdt || usdc.address() != snapshot.usdc {
            return Err(SaleError::InvalidArgument(
                "currency collaborators do not match snapshot".to_string(),
            ));
        }
        Self::validate_wiring(snapshot.owner, snapshot.address, snapshot.usdt, snapshot.usdc)?;
        if snapshot.total_supply != total_supply_units() {
            return Err(SaleError::InvalidArgument("snapshot total supply mismatch".to_string()));
        }
        if snapshot.token_price.is_zero() {
            return Err(SaleError::InvalidArgument("snapshot token price is zero".to_string()));
        }

        let accounts = BalanceTable::from_parts(
            snapshot.total_supply,
            snapshot.balances,
            snapshot.allowances.into_iter().map(|r| ((r.owner, r.spender), r.amount)),
        )?;

        Ok(Self {
            address: snapshot.address,
            owner: snapshot.owner,
            accounts,
            usdt,
            usdc,
            token_price: snapshot.token_price,
            sale_active: snapshot.sale_active,
            events: Vec::new(),
            listener: None,
        })
    }

    pub fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create snapshot {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.snapshot())?;
        log::info!("[DEMI] snapshot written to {}", path.display());
        Ok(())
    }

    pub fn load_snapshot(
        path: &Path,
        usdt: Arc<dyn StableCurrency>,
        usdc: Arc<dyn StableCurrency>,
    ) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        let ledger = Self::from_snapshot(snapshot, usdt, usdc)?;
        log::info!("[DEMI] restored {:?} from {}", ledger.address, path.display());
        Ok(ledger)
    }

    // ------------------------------------------
    // Internals
    // ------------------------------------------

    fn ensure_owner(&self, caller: AccountId, op: &str) -> Result<(), SaleError> {
        if caller != self.owner {
            log::warn!("[DEMI] {} rejected: {:?} is not the owner", op, caller);
            return Err(SaleError::Unauthorized { caller });
        }
        Ok(())
    }

    fn currency(&self, id: Address) -> Result<Arc<dyn StableCurrency>, SaleError> {
        [&self.usdt, &self.usdc]
            .into_iter()
            .find(|c| c.address() == id)
            .cloned()
            .ok_or(SaleError::UnsupportedCurrency(id))
    }

    fn emit(&mut self, event: SaleEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => log::info!("[DEMI] {} {}", event.name(), json),
            Err(_) => log::info!("[DEMI] {:?}", event),
        }
        if let Some(listener) = &mut self.listener {
            match listener.on_event(&event) {
                Ok(()) => return,
                Err(e) => log::error!("[DEMI] listener failed on {}: {:?}", event.name(), e),
            }
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::MockStablecoin;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // ==========================================
    // Helper Functions
    // ==========================================

    fn owner() -> Address {
        Address::repeat_byte(0x0a)
    }

    fn buyer() -> Address {
        Address::repeat_byte(0x0b)
    }

    fn contract() -> Address {
        Address::repeat_byte(0xde)
    }

    fn create_test_ledger() -> (SaleLedger, Arc<MockStablecoin>, Arc<MockStablecoin>) {
        let usdt = Arc::new(MockStablecoin::new(Address::repeat_byte(0xc2), "USDT", 6));
        let usdc = Arc::new(MockStablecoin::new(Address::repeat_byte(0x27), "USDC", 6));
        let ledger = SaleLedger::new(owner(), contract(), usdt.clone(), usdc.clone()).unwrap();
        (ledger, usdt, usdc)
    }

    fn fund_buyer(coin: &MockStablecoin, amount: u64) {
        coin.mint(buyer(), U256::from(amount));
        coin.approve(buyer(), contract(), U256::from(amount));
    }

    // ==========================================
    // 1. Construction
    // ==========================================

    #[test]
    fn test_construction_defaults() {
        let (ledger, _usdt, _usdc) = create_test_ledger();

        assert_eq!(ledger.owner(), owner());
        assert_eq!(ledger.total_supply(), U256::from(3_300_000_000u64) * U256::exp10(18));
        assert_eq!(ledger.balance_of(contract()), ledger.total_supply());
        assert_eq!(ledger.token_price(), U256::from(10_000u64));
        assert!(ledger.sale_active());
        assert_eq!(ledger.events().len(), 1, "mint transfer only");
    }

    #[test]
    fn test_deploy_derives_create_address() {
        let usdt = Arc::new(MockStablecoin::new(Address::repeat_byte(0xc2), "USDT", 6));
        let usdc = Arc::new(MockStablecoin::new(Address::repeat_byte(0x27), "USDC", 6));
        let ledger = SaleLedger::deploy(owner(), 0, usdt, usdc).unwrap();
        assert_eq!(ledger.address(), get_contract_address(owner(), 0u64));
        assert_eq!(ledger.remaining_supply(), ledger.total_supply());
    }

    #[test]
    fn test_construction_rejects_identical_currencies() {
        let usdt = Arc::new(MockStablecoin::new(Address::repeat_byte(0xc2), "USDT", 6));
        let result = SaleLedger::new(owner(), contract(), usdt.clone(), usdt);
        assert!(matches!(result, Err(SaleError::InvalidArgument(_))));
    }

    // ==========================================
    // 2. Purchase
    // ==========================================

    #[test]
    fn test_buy_pull_failure_changes_nothing() {
        let (mut ledger, usdt, _usdc) = create_test_ledger();
        usdt.mint(buyer(), U256::from(5_000_000u64));
        // no approval

        let result = ledger.buy(buyer(), usdt.address(), U256::from(1_000_000u64));
        assert!(matches!(result, Err(SaleError::CurrencyTransferFailed { .. })));
        assert_eq!(ledger.balance_of(buyer()), U256::zero());
        assert_eq!(ledger.remaining_supply(), ledger.total_supply());
        assert_eq!(usdt.balance_of(buyer()), U256::from(5_000_000u64));
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_buy_too_small_payment() {
        let (mut ledger, usdt, _usdc) = create_test_ledger();
        fund_buyer(&usdt, 10);
        ledger.set_token_price(owner(), U256::MAX / U256::exp10(10)).unwrap();

        let result = ledger.buy(buyer(), usdt.address(), U256::one());
        assert!(matches!(result, Err(SaleError::InvalidArgument(_))));
        assert_eq!(usdt.balance_of(buyer()), U256::from(10u64));
    }

    // ==========================================
    // 3. ERC20 surface
    // ==========================================

    #[test]
    fn test_transfer_from_spends_allowance() {
        let (mut ledger, usdt, _usdc) = create_test_ledger();
        fund_buyer(&usdt, 1_000_000);
        ledger.buy(buyer(), usdt.address(), U256::from(1_000_000u64)).unwrap();

        let spender = Address::repeat_byte(0x5e);
        let receiver = Address::repeat_byte(0x7e);
        ledger.approve(buyer(), spender, U256::exp10(19)).unwrap();
        ledger.transfer_from(spender, buyer(), receiver, U256::exp10(18)).unwrap();

        assert_eq!(ledger.balance_of(receiver), U256::exp10(18));
        assert_eq!(ledger.allowance(buyer(), spender), U256::exp10(19) - U256::exp10(18));

        let err = ledger.transfer_from(spender, buyer(), receiver, U256::exp10(20)).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_ALLOWANCE");
        assert!(ledger.verify_supply());
    }

    #[test]
    fn test_infinite_allowance_not_decremented() {
        let (mut ledger, _usdt, _usdc) = create_test_ledger();
        ledger.withdraw_tokens(owner(), buyer(), U256::from(500u64)).unwrap();
        let spender = Address::repeat_byte(0x5e);
        ledger.approve(buyer(), spender, U256::MAX).unwrap();

        ledger.transfer_from(spender, buyer(), spender, U256::from(200u64)).unwrap();
        assert_eq!(ledger.allowance(buyer(), spender), U256::MAX);
    }

    #[test]
    fn test_transfer_rejects_zero_recipient() {
        let (mut ledger, _usdt, _usdc) = create_test_ledger();
        let result = ledger.transfer(contract(), Address::zero(), U256::one());
        assert!(matches!(result, Err(SaleError::InvalidArgument(_))));
    }

    // ==========================================
    // 4. Listener / Snapshot
    // ==========================================

    #[test]
    fn test_listener_notification() {
        struct TestListener {
            events: Arc<Mutex<Vec<SaleEvent>>>,
        }

        impl SaleListener for TestListener {
            fn on_event(&mut self, event: &SaleEvent) -> anyhow::Result<()> {
                self.events.lock().unwrap().push(event.clone());
                Ok(())
            }
        }

        let (mut ledger, usdt, _usdc) = create_test_ledger();
        let events = Arc::new(Mutex::new(Vec::new()));
        ledger.set_listener(Box::new(TestListener { events: Arc::clone(&events) }));

        fund_buyer(&usdt, 2_000_000);
        ledger.buy(buyer(), usdt.address(), U256::from(2_000_000u64)).unwrap();
        ledger.set_sale_active(owner(), false).unwrap();

        let recorded = events.lock().unwrap();
        assert_eq!(recorded.len(), 3, "Transfer, Purchase, SaleStatusChanged");
        assert_eq!(recorded[1].name(), "Purchase");
        assert_eq!(recorded[2], SaleEvent::SaleStatusChanged { active: false });
        // mint event predates the listener
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_rejected_events_stay_buffered() {
        struct FailingListener;

        impl SaleListener for FailingListener {
            fn on_event(&mut self, event: &SaleEvent) -> anyhow::Result<()> {
                anyhow::bail!("sink unavailable for {}", event.name())
            }
        }

        let (mut ledger, _usdt, _usdc) = create_test_ledger();
        ledger.drain_events();
        ledger.set_listener(Box::new(FailingListener));

        ledger.set_sale_active(owner(), false).unwrap();
        ledger.set_token_price(owner(), U256::from(20_000u64)).unwrap();

        let pending = ledger.drain_events();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0], SaleEvent::SaleStatusChanged { active: false });
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (mut ledger, usdt, usdc) = create_test_ledger();
        fund_buyer(&usdc, 3_000_000);
        ledger.buy(buyer(), usdc.address(), U256::from(3_000_000u64)).unwrap();
        ledger.set_token_price(owner(), U256::from(20_000u64)).unwrap();
        ledger.approve(buyer(), owner(), U256::from(42u64)).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demi.json");
        ledger.save_snapshot(&path).unwrap();

        let restored = SaleLedger::load_snapshot(&path, usdt.clone(), usdc.clone()).unwrap();
        assert_eq!(restored.snapshot(), ledger.snapshot());
        assert_eq!(restored.balance_of(buyer()), U256::from(300u64) * U256::exp10(18));
        assert_eq!(restored.token_price(), U256::from(20_000u64));
        assert!(restored.events().is_empty());
    }

    #[test]
    fn test_snapshot_rejects_swapped_currencies() {
        let (ledger, usdt, usdc) = create_test_ledger();
        let result = SaleLedger::from_snapshot(ledger.snapshot(), usdc, usdt);
        assert!(matches!(result, Err(SaleError::InvalidArgument(_))));
    }

    #[test]
    fn test_snapshot_rejects_tampered_balances() {
        let (ledger, usdt, usdc) = create_test_ledger();
        let mut snapshot = ledger.snapshot();
        snapshot.balances.push((buyer(), Balance { amount: U256::one(), version: 1 }));
        assert!(SaleLedger::from_snapshot(snapshot, usdt, usdc).is_err());
    }
}
