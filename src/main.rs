use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use dex_liquidity_desk::config::{self, EngineConfig};
use dex_liquidity_desk::deposit::DepositAttempt;
use dex_liquidity_desk::types::SortKey;
use dex_liquidity_desk::{LiquidityDesk, RpcWallet};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn load_config() -> eyre::Result<EngineConfig> {
    if let Ok(path) = std::env::var("DESK_CONFIG") {
        return config::load_config_file(&path);
    }
    if std::path::Path::new("desk.json").exists() {
        return config::load_config_file("desk.json");
    }
    EngineConfig::from_env()
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    dotenv().ok();

    let config = load_config()?;
    let signer: PrivateKeySigner = std::env::var("SIGNER_PRIVATE_KEY")
        .map_err(|_| eyre::eyre!("SIGNER_PRIVATE_KEY must be set"))?
        .parse()?;
    let wallet = Arc::new(RpcWallet::new(&config.rpc_url, signer)?);

    let desk = LiquidityDesk::new(config, wallet).await?;
    let account = desk.connect().await?;
    info!(
        "Connected as {:?} with native balance {:?}",
        account,
        desk.native_balance().await
    );

    for token in desk.search("", SortKey::Liquidity).await {
        info!(
            "{:<8} {:<24} price {:>12.6} liquidity {:>14.2} {:?}",
            token.symbol, token.name, token.price, token.liquidity, token.contract_address
        );
    }

    // Optional deposit: TOKEN_ADDRESS + DEPOSIT_AMOUNT, TOKEN_AMOUNT overrides the quote.
    let (Ok(token), Ok(amount_native)) = (
        std::env::var("TOKEN_ADDRESS"),
        std::env::var("DEPOSIT_AMOUNT"),
    ) else {
        return Ok(());
    };
    let token: Address = token.parse()?;
    let quote = desk.quote(&amount_native, token).await;
    let amount_token = match std::env::var("TOKEN_AMOUNT") {
        Ok(amount) => amount,
        Err(_) if quote.is_empty() => {
            warn!("No price for {:?}; set TOKEN_AMOUNT to deposit anyway", token);
            return Ok(());
        }
        Err(_) => quote.amount_b,
    };

    let mut attempt = DepositAttempt::new();
    desk.approve(&mut attempt, token, &amount_native, &amount_token)
        .await?;
    let receipt = desk
        .deposit(&mut attempt, token, &amount_native, &amount_token)
        .await?;
    info!(
        "Deposit {:?} confirmed in block {:?}",
        receipt.confirmation.tx_hash, receipt.confirmation.block_number
    );
    if let Some(token) = desk.token(token).await {
        info!(
            "{} now priced at {:.6}, liquidity {:.2}",
            token.symbol, token.price, token.liquidity
        );
    }

    Ok(())
}
