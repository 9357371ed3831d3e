use crate::approval::{ApprovalGate, ApprovalOutcome};
use crate::config::EngineConfig;
use crate::deposit::{DepositAttempt, DepositFlow, DepositReceipt};
use crate::discovery::{ExplorerClient, TokenDiscovery};
use crate::error::{EngineError, Result};
use crate::quote;
use crate::registry::TokenRegistry;
use crate::types::{DepositQuote, SortKey, Token};
use crate::wallet::WalletProvider;
use alloy::primitives::{Address, U256};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{info, warn};

struct DeskState {
    account: Option<Address>,
    native_balance: Option<U256>,
    registry: TokenRegistry,
}

/// Session-level entry point: wallet connection, token registry and the
/// approve/deposit flow against the configured pair.
pub struct LiquidityDesk {
    config: Arc<EngineConfig>,
    wallet: Arc<dyn WalletProvider>,
    discovery: Arc<dyn TokenDiscovery>,
    flow: DepositFlow,
    state: Arc<Mutex<DeskState>>,
}

impl LiquidityDesk {
    /// Desk backed by the block explorer named in `config`.
    pub async fn new(config: EngineConfig, wallet: Arc<dyn WalletProvider>) -> Result<Self> {
        let explorer = ExplorerClient::from_config(&config)?;
        Ok(Self::with_discovery(config, wallet, Arc::new(explorer)).await)
    }

    pub async fn with_discovery(
        config: EngineConfig,
        wallet: Arc<dyn WalletProvider>,
        discovery: Arc<dyn TokenDiscovery>,
    ) -> Self {
        let gate = ApprovalGate::new(Arc::clone(&wallet), config.pair_address, config.gas.clone());
        let flow = DepositFlow::new(Arc::clone(&wallet), gate);
        let state = Arc::new(Mutex::new(DeskState {
            account: None,
            native_balance: None,
            registry: TokenRegistry::with_native_price(config.native_price),
        }));

        let weak_wallet: Weak<dyn WalletProvider> = Arc::downgrade(&wallet);
        let listener_discovery = Arc::clone(&discovery);
        let listener_state = Arc::clone(&state);
        wallet
            .on_accounts_changed(Arc::new(move |accounts: Vec<Address>| {
                let Some(wallet) = weak_wallet.upgrade() else {
                    return;
                };
                let discovery = Arc::clone(&listener_discovery);
                let state = Arc::clone(&listener_state);
                tokio::spawn(async move {
                    apply_accounts(wallet, discovery, state, accounts).await;
                });
            }))
            .await;

        Self {
            config: Arc::new(config),
            wallet,
            discovery,
            flow,
            state,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Request accounts, record the first one with its native balance, and
    /// rebuild the registry from discovery.
    pub async fn connect(&self) -> Result<Address> {
        let accounts = self.wallet.request_accounts().await?;
        let Some(&account) = accounts.first() else {
            warn!("No wallet account available");
            return Err(EngineError::WalletUnavailable);
        };
        apply_accounts(
            Arc::clone(&self.wallet),
            Arc::clone(&self.discovery),
            Arc::clone(&self.state),
            accounts,
        )
        .await;
        Ok(account)
    }

    /// Same handling as the wallet's accounts-changed notification.
    pub async fn handle_accounts_changed(&self, accounts: Vec<Address>) {
        apply_accounts(
            Arc::clone(&self.wallet),
            Arc::clone(&self.discovery),
            Arc::clone(&self.state),
            accounts,
        )
        .await;
    }

    pub async fn account(&self) -> Option<Address> {
        self.state.lock().await.account
    }

    pub async fn native_balance(&self) -> Option<U256> {
        self.state.lock().await.native_balance
    }

    pub async fn tokens(&self) -> Vec<Token> {
        self.state.lock().await.registry.tokens().to_vec()
    }

    pub async fn token(&self, address: Address) -> Option<Token> {
        self.state.lock().await.registry.get(address).cloned()
    }

    pub async fn search(&self, term: &str, sort: SortKey) -> Vec<Token> {
        self.state.lock().await.registry.search(term, sort)
    }

    /// Manually registered token, e.g. right after deploying it.
    pub async fn register_token(&self, token: Token) {
        info!("Registering {} at {:?}", token.symbol, token.contract_address);
        self.state.lock().await.registry.upsert(token);
    }

    /// Quote the `token` amount paired with `amount_native` of the native asset.
    pub async fn quote(&self, amount_native: &str, token: Address) -> DepositQuote {
        let state = self.state.lock().await;
        let price_a = Some(state.registry.native().price);
        let price_b = state.registry.get(token).map(|t| t.price);
        quote::quote(amount_native, price_a, price_b)
    }

    async fn pair_tokens(&self, token: Address) -> Result<(Token, Token)> {
        let state = self.state.lock().await;
        let selected = state
            .registry
            .get(token)
            .cloned()
            .ok_or(EngineError::UnknownToken(token))?;
        Ok((state.registry.native().clone(), selected))
    }

    pub async fn approve(
        &self,
        attempt: &mut DepositAttempt,
        token: Address,
        amount_native: &str,
        amount_token: &str,
    ) -> Result<ApprovalOutcome> {
        let (_, selected) = self.pair_tokens(token).await?;
        self.flow
            .approve(attempt, &selected, amount_native, amount_token)
            .await
    }

    /// Deposit and fold the pool's new valuation into the registry.
    pub async fn deposit(
        &self,
        attempt: &mut DepositAttempt,
        token: Address,
        amount_native: &str,
        amount_token: &str,
    ) -> Result<DepositReceipt> {
        let (native, selected) = self.pair_tokens(token).await?;
        let receipt = self
            .flow
            .deposit(attempt, &native, &selected, amount_native, amount_token)
            .await?;

        let owner = self.wallet.signer_address().await.ok();
        let balance = match owner {
            Some(owner) => self.wallet.native_balance(owner).await.ok(),
            None => None,
        };

        let mut state = self.state.lock().await;
        if let Some(valuation) = receipt.valuation {
            state
                .registry
                .update_liquidity(token, valuation.liquidity, valuation.price);
            info!(
                "{} repriced at {:.6} with liquidity {:.2}",
                selected.symbol, valuation.price, valuation.liquidity
            );
        }
        if balance.is_some() {
            state.native_balance = balance;
        }
        Ok(receipt)
    }
}

async fn apply_accounts(
    wallet: Arc<dyn WalletProvider>,
    discovery: Arc<dyn TokenDiscovery>,
    state: Arc<Mutex<DeskState>>,
    accounts: Vec<Address>,
) {
    let Some(&account) = accounts.first() else {
        info!("Wallet disconnected; resetting session");
        let mut guard = state.lock().await;
        guard.account = None;
        guard.native_balance = None;
        guard.registry.reset();
        return;
    };

    let balance = match wallet.native_balance(account).await {
        Ok(balance) => Some(balance),
        Err(e) => {
            warn!("Error fetching balance of {:?}: {}", account, e);
            None
        }
    };
    {
        let mut guard = state.lock().await;
        guard.account = Some(account);
        guard.native_balance = balance;
    }

    let discovered = discovery.discover(Arc::clone(&wallet), account).await;

    let mut guard = state.lock().await;
    if guard.account != Some(account) {
        return;
    }
    guard.registry.reset();
    match discovered {
        Ok(tokens) => {
            info!("Discovered {} tokens for {:?}", tokens.len(), account);
            guard.registry.merge(tokens);
        }
        Err(e) => warn!("Error fetching deployed tokens: {}", e),
    }
}
