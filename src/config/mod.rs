use crate::registry::NATIVE_REFERENCE_PRICE;
use alloy::primitives::Address;
use eyre::Result;
use std::fs;
use std::time::Duration;

pub const DEFAULT_EXPLORER_URL: &str = "https://api-sepolia.etherscan.io/api";
pub const DEFAULT_PINNING_API_URL: &str = "https://api.pinata.cloud";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.pinata.cloud";

/// Off-chain listing fetches give up after this long.
pub const EXPLORER_TIMEOUT: Duration = Duration::from_secs(20);

/// Gas used for an approval when the node cannot estimate it.
pub const FALLBACK_APPROVE_GAS: u64 = 100_000;

/// Submitted gas limit as a percentage of the estimate.
pub const GAS_LIMIT_PERCENT: u64 = 150;

/// Largest file accepted for pinning (icon/image uploads).
pub const MAX_PIN_FILE_BYTES: usize = 50 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct GasPolicy {
    pub fallback_approve_gas: u64,
    pub limit_percent: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            fallback_approve_gas: FALLBACK_APPROVE_GAS,
            limit_percent: GAS_LIMIT_PERCENT,
        }
    }
}

impl GasPolicy {
    pub fn limit_for(&self, estimate: u64) -> u64 {
        estimate.saturating_mul(self.limit_percent) / 100
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinningConfig {
    pub api_url: String,
    pub gateway_url: String,
    pub jwt: String,
    pub max_file_bytes: usize,
}

/// Everything the desk needs to talk to the chain and to off-chain services.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub rpc_url: String,
    pub explorer_url: String,
    pub explorer_api_key: String,
    pub explorer_timeout: Duration,
    /// Pair contract; also the spender approvals are granted to.
    pub pair_address: Address,
    pub native_price: f64,
    pub gas: GasPolicy,
    pub pinning: Option<PinningConfig>,
}

impl EngineConfig {
    pub fn new(rpc_url: impl Into<String>, pair_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            explorer_api_key: String::new(),
            explorer_timeout: EXPLORER_TIMEOUT,
            pair_address,
            native_price: NATIVE_REFERENCE_PRICE,
            gas: GasPolicy::default(),
            pinning: None,
        }
    }

    /// Build from `RPC_URL` and `PAIR_CONTRACT_ADDRESS`, then apply the optional
    /// `ETHERSCAN_API_KEY`, `EXPLORER_URL`, `NATIVE_PRICE_USD` and `PINATA_JWT`.
    pub fn from_env() -> Result<Self> {
        let rpc_url = std::env::var("RPC_URL").map_err(|_| eyre::eyre!("RPC_URL must be set"))?;
        let pair = std::env::var("PAIR_CONTRACT_ADDRESS")
            .map_err(|_| eyre::eyre!("PAIR_CONTRACT_ADDRESS must be set"))?;
        let mut config = Self::new(rpc_url, pair.parse()?);
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("RPC_URL") {
            self.rpc_url = url;
        }
        if let Ok(url) = std::env::var("EXPLORER_URL") {
            self.explorer_url = url;
        }
        match std::env::var("ETHERSCAN_API_KEY") {
            Ok(key) => self.explorer_api_key = key,
            Err(_) if self.explorer_api_key.is_empty() => {
                tracing::warn!(
                    "ETHERSCAN_API_KEY not set; token discovery will be rejected by the explorer"
                );
            }
            Err(_) => {}
        }
        if let Some(price) = std::env::var("NATIVE_PRICE_USD")
            .ok()
            .and_then(|p| p.parse::<f64>().ok())
        {
            self.native_price = price;
        }
        if let Ok(jwt) = std::env::var("PINATA_JWT") {
            match self.pinning.as_mut() {
                Some(pinning) => pinning.jwt = jwt,
                None => {
                    self.pinning = Some(PinningConfig {
                        api_url: DEFAULT_PINNING_API_URL.to_string(),
                        gateway_url: DEFAULT_GATEWAY_URL.to_string(),
                        jwt,
                        max_file_bytes: MAX_PIN_FILE_BYTES,
                    })
                }
            }
        }
    }
}

/// Format of the `pinning` section in desk.json (camelCase).
#[derive(serde::Deserialize)]
struct PinningEntry {
    #[serde(rename = "apiUrl", default = "default_pinning_api")]
    api_url: String,
    #[serde(rename = "gatewayUrl", default = "default_gateway")]
    gateway_url: String,
    #[serde(rename = "maxFileBytes", default = "default_max_file_bytes")]
    max_file_bytes: usize,
}

/// Root format of desk.json. Secrets never live here; they come from the environment.
#[derive(serde::Deserialize)]
struct DeskFile {
    #[serde(rename = "rpcUrl", default)]
    rpc_url: String,
    #[serde(rename = "pairAddress")]
    pair_address: String,
    #[serde(rename = "explorerUrl", default = "default_explorer")]
    explorer_url: String,
    #[serde(rename = "explorerTimeoutSecs", default = "default_timeout_secs")]
    explorer_timeout_secs: u64,
    #[serde(rename = "nativePriceUSD", default = "default_native_price")]
    native_price_usd: f64,
    #[serde(rename = "fallbackApproveGas", default = "default_fallback_gas")]
    fallback_approve_gas: u64,
    #[serde(rename = "gasLimitPercent", default = "default_gas_percent")]
    gas_limit_percent: u64,
    #[serde(default)]
    pinning: Option<PinningEntry>,
}

fn default_pinning_api() -> String {
    DEFAULT_PINNING_API_URL.to_string()
}

fn default_gateway() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_max_file_bytes() -> usize {
    MAX_PIN_FILE_BYTES
}

fn default_explorer() -> String {
    DEFAULT_EXPLORER_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    EXPLORER_TIMEOUT.as_secs()
}

fn default_native_price() -> f64 {
    NATIVE_REFERENCE_PRICE
}

fn default_fallback_gas() -> u64 {
    FALLBACK_APPROVE_GAS
}

fn default_gas_percent() -> u64 {
    GAS_LIMIT_PERCENT
}

/// Parse desk.json content without touching the environment.
pub fn parse_config(content: &str) -> Result<EngineConfig> {
    let file: DeskFile = serde_json::from_str(content)?;
    let pair_address: Address = file.pair_address.parse()?;

    if file.gas_limit_percent < 100 {
        return Err(eyre::eyre!(
            "gasLimitPercent must be at least 100, got {}",
            file.gas_limit_percent
        ));
    }

    let mut config = EngineConfig::new(file.rpc_url, pair_address);
    config.explorer_url = file.explorer_url;
    config.explorer_timeout = Duration::from_secs(file.explorer_timeout_secs);
    config.native_price = file.native_price_usd;
    config.gas = GasPolicy {
        fallback_approve_gas: file.fallback_approve_gas,
        limit_percent: file.gas_limit_percent,
    };
    config.pinning = file.pinning.map(|p| PinningConfig {
        api_url: p.api_url,
        gateway_url: p.gateway_url,
        jwt: String::new(),
        max_file_bytes: p.max_file_bytes,
    });
    Ok(config)
}

/// Load desk.json, then overlay secrets and overrides from the environment.
pub fn load_config_file(path: &str) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    config.apply_env();
    if config.rpc_url.is_empty() {
        return Err(eyre::eyre!("rpcUrl missing from {} and RPC_URL unset", path));
    }
    Ok(config)
}
