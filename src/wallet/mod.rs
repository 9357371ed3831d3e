use crate::error::{EngineError, Result};
use crate::types::TxConfirmation;
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[cfg(test)]
pub mod mock;

/// Invoked with the new account list whenever the active accounts change.
pub type AccountsChangedCallback = Arc<dyn Fn(Vec<Address>) + Send + Sync>;

/// Wallet and node capabilities the desk depends on.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts the user has exposed; empty when nothing is connected.
    async fn request_accounts(&self) -> Result<Vec<Address>>;
    /// Address transactions are signed with.
    async fn signer_address(&self) -> Result<Address>;
    async fn native_balance(&self, owner: Address) -> Result<U256>;
    /// Read-only `eth_call`.
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes>;
    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64>;
    /// Sign, broadcast and wait for the receipt.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxConfirmation>;
    async fn on_accounts_changed(&self, callback: AccountsChangedCallback);
}

/// [`WalletProvider`] over an HTTP JSON-RPC node and an optional local signer.
pub struct RpcWallet {
    provider: Arc<dyn Provider<Http<Client>>>,
    accounts: Mutex<Vec<Address>>,
    listeners: Mutex<Vec<AccountsChangedCallback>>,
}

impl RpcWallet {
    /// Connect with a local signing key; its address is the only account.
    pub fn new(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let account = signer.address();
        let url = rpc_url
            .parse::<reqwest::Url>()
            .map_err(|e| EngineError::InvalidInput(format!("rpc url {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer))
            .on_http(url);

        info!("Wallet connected to {} as {:?}", rpc_url, account);
        Ok(Self {
            provider: Arc::new(provider),
            accounts: Mutex::new(vec![account]),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Reads only; every signing operation fails with `WalletUnavailable`.
    pub fn read_only(rpc_url: &str) -> Result<Self> {
        let url = rpc_url
            .parse::<reqwest::Url>()
            .map_err(|e| EngineError::InvalidInput(format!("rpc url {rpc_url}: {e}")))?;
        let provider = ProviderBuilder::new().on_http(url);
        Ok(Self {
            provider: Arc::new(provider),
            accounts: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Drop the exposed accounts and notify listeners.
    pub async fn disconnect(&self) {
        self.set_accounts(Vec::new()).await;
    }

    async fn set_accounts(&self, accounts: Vec<Address>) {
        {
            let mut current = self.accounts.lock().await;
            if *current == accounts {
                return;
            }
            *current = accounts.clone();
        }
        let listeners = self.listeners.lock().await.clone();
        for listener in listeners {
            listener(accounts.clone());
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.lock().await.clone())
    }

    async fn signer_address(&self) -> Result<Address> {
        self.accounts
            .lock()
            .await
            .first()
            .copied()
            .ok_or(EngineError::WalletUnavailable)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.provider.get_balance(owner).await?)
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        Ok(self.provider.call(&tx).await?)
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64> {
        self.provider
            .estimate_gas(&tx)
            .await
            .map_err(|e| EngineError::GasEstimation(e.to_string()))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxConfirmation> {
        if self.accounts.lock().await.is_empty() {
            return Err(EngineError::WalletUnavailable);
        }
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| EngineError::TransactionRejected(e.to_string()))?;
        debug!("Submitted transaction {:?}", pending.tx_hash());

        let receipt = pending.get_receipt().await.map_err(|e| {
            warn!("Waiting for receipt failed: {:?}", e);
            EngineError::Rpc(e.to_string())
        })?;

        Ok(TxConfirmation {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            success: receipt.status(),
        })
    }

    async fn on_accounts_changed(&self, callback: AccountsChangedCallback) {
        self.listeners.lock().await.push(callback);
    }
}
