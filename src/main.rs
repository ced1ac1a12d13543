use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use ethers::types::{Address, U256};
use eyre::{eyre, Result};

use demi_sale::configure::{self, AppConfig};
use demi_sale::currency::{MockStablecoin, StableCurrency};
use demi_sale::ledger::SaleLedger;
use demi_sale::logger::setup_logger;
use demi_sale::models::price_conversion::{to_display_amount, to_smallest_units, STABLECOIN_DECIMALS};
use demi_sale::service::SaleService;

#[derive(Parser, Debug)]
#[command(author, version, about = "DEMI token sale ledger", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Construct the ledger from configuration and print the deployment summary
    Deploy {
        /// Write the freshly deployed state to this snapshot file
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Show how many DEMI a stablecoin payment buys at the initial price
    Quote {
        #[arg(long, value_enum, default_value = "usdt")]
        currency: CurrencyArg,
        /// Payment in whole stablecoin units, e.g. "12.5"
        #[arg(long)]
        amount: String,
    },
    /// Deploy against local mock stablecoins and run a purchase and a withdrawal
    Simulate {
        #[arg(long, value_enum, default_value = "usdt")]
        currency: CurrencyArg,
        /// Payment in whole stablecoin units
        #[arg(long, default_value = "100")]
        amount: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CurrencyArg {
    Usdt,
    Usdc,
}

struct Deployment {
    ledger: SaleLedger,
    usdt: Arc<MockStablecoin>,
    usdc: Arc<MockStablecoin>,
    deployer: Address,
}

impl Deployment {
    fn coin(&self, currency: CurrencyArg) -> &Arc<MockStablecoin> {
        match currency {
            CurrencyArg::Usdt => &self.usdt,
            CurrencyArg::Usdc => &self.usdc,
        }
    }
}

// Local stand-ins for the on-chain stablecoins at the configured addresses
fn deploy_from_config(config: &AppConfig) -> Result<Deployment> {
    let usdt = Arc::new(MockStablecoin::new(config.usdt()?, "USDT", STABLECOIN_DECIMALS));
    let usdc = Arc::new(MockStablecoin::new(config.usdc()?, "USDC", STABLECOIN_DECIMALS));
    let deployer = config.deployer()?;

    let ledger = SaleLedger::deploy(deployer, config.deployer_nonce, usdt.clone(), usdc.clone())?;
    Ok(Deployment { ledger, usdt, usdc, deployer })
}

fn print_summary(config: &AppConfig, ledger: &SaleLedger) {
    let rule = "=".repeat(60);
    println!("\n{}", rule);
    println!("DEMI TOKEN DEPLOYED ({})", config.network);
    println!("{}", rule);
    println!("\nContract address: {:?}", ledger.address());
    println!("Owner:            {:?}", ledger.owner());
    println!("\nToken details:");
    println!(
        "   Total Supply:  {} {}",
        to_display_amount(ledger.total_supply(), ledger.decimals()),
        ledger.symbol()
    );
    println!(
        "   Initial Price: ${} per {}",
        to_display_amount(ledger.token_price(), STABLECOIN_DECIMALS),
        ledger.symbol()
    );
    println!("   Sale Status:   {}", if ledger.sale_active() { "ACTIVE" } else { "INACTIVE" });
    println!("\nExplorer: {}\n", config.explorer_link(ledger.address()));
}

fn run_deploy(config: &AppConfig, snapshot: Option<PathBuf>) -> Result<()> {
    let deployment = deploy_from_config(config)?;
    print_summary(config, &deployment.ledger);

    if let Some(path) = snapshot.or_else(|| config.snapshot_path.clone().map(PathBuf::from)) {
        deployment.ledger.save_snapshot(&path).map_err(|e| eyre!("{:#}", e))?;
        println!("Snapshot written to {}", path.display());
    }
    Ok(())
}

fn run_quote(config: &AppConfig, currency: CurrencyArg, amount: &str) -> Result<()> {
    let deployment = deploy_from_config(config)?;
    let coin = deployment.coin(currency);
    let pay = to_smallest_units(amount, coin.decimals())?;
    let tokens = deployment.ledger.quote_tokens(coin.address(), pay)?;

    println!(
        "{} {} buys {} DEMI",
        amount,
        coin.symbol(),
        to_display_amount(tokens, deployment.ledger.decimals())
    );
    Ok(())
}

fn run_simulate(config: &AppConfig, currency: CurrencyArg, amount: &str) -> Result<()> {
    let deployment = deploy_from_config(config)?;
    let coin = deployment.coin(currency).clone();
    let contract = deployment.ledger.address();
    let owner = deployment.deployer;
    let buyer = Address::from_low_u64_be(0xb0b);

    let pay = to_smallest_units(amount, coin.decimals())?;
    coin.mint(buyer, pay);
    coin.approve(buyer, contract, pay);

    let service = SaleService::new(deployment.ledger);
    let tokens = service.buy(buyer, coin.address(), pay)?;
    println!("Buyer {:?} paid {} {} for {} DEMI", buyer, amount, coin.symbol(), to_display_amount(tokens, 18));

    service.withdraw_proceeds(owner, coin.address(), pay)?;
    println!(
        "Owner withdrew proceeds: {} {}",
        to_display_amount(coin.balance_of(owner), coin.decimals()),
        coin.symbol()
    );

    service.with_ledger(|ledger| {
        println!(
            "Remaining for sale: {} DEMI",
            to_display_amount(ledger.remaining_supply(), ledger.decimals())
        );
        println!("Events committed: {}", ledger.events().len());
    });

    let total: U256 = service.total_supply();
    println!("Total supply unchanged: {}", to_display_amount(total, 18));
    Ok(())
}

fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let config = configure::load_config()?;
    setup_logger(&config).map_err(|e| eyre!("failed to initialise logger: {:#}", e))?;

    match args.command {
        Command::Deploy { snapshot } => run_deploy(&config, snapshot),
        Command::Quote { currency, amount } => run_quote(&config, currency, &amount),
        Command::Simulate { currency, amount } => run_simulate(&config, currency, &amount),
    }
}
