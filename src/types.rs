use alloy::primitives::{Address, TxHash, U256};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Contract address used for the chain's native asset.
pub const NATIVE_ADDRESS: Address = Address::ZERO;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub contract_address: Address,
    pub decimals: u8,
    pub price: f64,
    pub liquidity: f64,
    pub volume_24h: f64,
    pub total_supply: f64,
    pub created: NaiveDate,
}

impl Token {
    /// Token freshly seen on chain: no market data yet.
    pub fn new(
        contract_address: Address,
        symbol: impl Into<String>,
        name: impl Into<String>,
        decimals: u8,
        created: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            contract_address,
            decimals,
            price: 0.0,
            liquidity: 0.0,
            volume_24h: 0.0,
            total_supply: 0.0,
            created,
        }
    }

    pub fn is_native(&self) -> bool {
        self.contract_address == NATIVE_ADDRESS
    }
}

/// Paired deposit amounts. Both fields are empty when no quote is available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositQuote {
    pub amount_a: String,
    pub amount_b: String,
}

impl DepositQuote {
    pub fn is_empty(&self) -> bool {
        self.amount_b.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositState {
    Idle,
    Approving,
    Approved,
    Depositing,
    Confirmed,
    Failed,
}

impl DepositState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DepositState::Confirmed | DepositState::Failed)
    }
}

/// Mined transaction as reported by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Pair reserves in base units: native asset first, token second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub reserve_native: U256,
    pub reserve_token: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Price,
    #[default]
    Liquidity,
    Volume,
    Created,
    TotalSupply,
}
