use crate::config::EngineConfig;
use crate::contracts::Erc20;
use crate::error::{EngineError, Result};
use crate::quote::from_base_units;
use crate::registry::native_token;
use crate::types::Token;
use crate::wallet::WalletProvider;
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One entry of an explorer `txlist` response. Unused fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExplorerTx {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub to: String,
    #[serde(rename = "contractAddress", default)]
    pub contract_address: String,
    #[serde(rename = "timeStamp", default)]
    pub time_stamp: String,
}

#[derive(Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    result: serde_json::Value,
}

/// Source of tokens associated with an account.
#[async_trait]
pub trait TokenDiscovery: Send + Sync {
    async fn discover(
        &self,
        wallet: Arc<dyn WalletProvider>,
        account: Address,
    ) -> Result<Vec<Token>>;
}

/// A contract deployed by the account, as seen by the explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCreation {
    pub address: Address,
    pub timestamp: i64,
}

pub struct ExplorerClient {
    client: Client,
    url: String,
    api_key: String,
}

impl ExplorerClient {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            config.explorer_url.clone(),
            config.explorer_api_key.clone(),
            config.explorer_timeout,
        )
    }

    /// Latest transactions of `address`, newest first (single page).
    pub async fn list_transactions(&self, address: Address) -> Result<Vec<ExplorerTx>> {
        info!("Fetching transactions of {:?} from explorer...", address);
        let address = address.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("module", "account"),
                ("action", "txlist"),
                ("address", address.as_str()),
                ("startblock", "0"),
                ("endblock", "99999999"),
                ("page", "1"),
                ("offset", "10000"),
                ("sort", "desc"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: ExplorerResponse = response.json().await?;
        parse_transactions(body)
    }

    /// Discover tokens the account deployed and probe their metadata.
    pub async fn discover_tokens(
        &self,
        wallet: Arc<dyn WalletProvider>,
        account: Address,
    ) -> Result<Vec<Token>> {
        let txs = self.list_transactions(account).await?;
        let creations = contract_creations(&txs);
        info!(
            "Explorer returned {} transactions, {} contract creations",
            txs.len(),
            creations.len()
        );
        Ok(probe_tokens(wallet, &creations).await)
    }
}

#[async_trait]
impl TokenDiscovery for ExplorerClient {
    async fn discover(
        &self,
        wallet: Arc<dyn WalletProvider>,
        account: Address,
    ) -> Result<Vec<Token>> {
        self.discover_tokens(wallet, account).await
    }
}

fn parse_transactions(body: ExplorerResponse) -> Result<Vec<ExplorerTx>> {
    if body.result.is_array() {
        return serde_json::from_value(body.result)
            .map_err(|e| EngineError::Explorer(format!("malformed txlist: {e}")));
    }
    error!(
        "Explorer error (status {}): {} {:?}",
        body.status, body.message, body.result
    );
    Err(EngineError::Explorer(format!(
        "{}: {}",
        body.message,
        body.result.as_str().unwrap_or_default()
    )))
}

/// Contract-creation transactions (empty `to`, non-empty `contractAddress`),
/// first occurrence per address.
pub fn contract_creations(txs: &[ExplorerTx]) -> Vec<ContractCreation> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tx in txs {
        if !tx.to.is_empty() || tx.contract_address.is_empty() {
            continue;
        }
        let Ok(address) = tx.contract_address.parse::<Address>() else {
            debug!("Skipping unparsable contract address {}", tx.contract_address);
            continue;
        };
        if !seen.insert(address) {
            continue;
        }
        out.push(ContractCreation {
            address,
            timestamp: tx.time_stamp.parse().unwrap_or(0),
        });
    }
    out
}

fn is_lp_token(symbol: &str, name: &str) -> bool {
    symbol == "LP" || name == "Liquidity Pool Token"
}

/// Probe each created contract as an ERC-20. Non-tokens, LP tokens and repeated
/// symbols (the native symbol included) are skipped.
pub async fn probe_tokens(
    wallet: Arc<dyn WalletProvider>,
    creations: &[ContractCreation],
) -> Vec<Token> {
    let mut symbols: HashSet<String> = HashSet::from([native_token().symbol]);
    let mut tokens = Vec::new();

    for creation in creations {
        let meta = match Erc20::new(Arc::clone(&wallet), creation.address).metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Skipping non-ERC20 contract {:?}: {}", creation.address, e);
                continue;
            }
        };
        if is_lp_token(&meta.symbol, &meta.name) {
            continue;
        }
        if !symbols.insert(meta.symbol.clone()) {
            continue;
        }

        let created = chrono::DateTime::from_timestamp(creation.timestamp, 0)
            .map(|dt| dt.date_naive())
            .unwrap_or_else(|| chrono::Utc::now().date_naive());
        let mut token = Token::new(
            creation.address,
            meta.symbol,
            meta.name,
            meta.decimals,
            created,
        );
        token.total_supply = from_base_units(meta.total_supply, meta.decimals);
        tokens.push(token);
    }
    tokens
}
