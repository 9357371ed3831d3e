//! In-memory chain used by unit tests. Speaks the same ABI as the real contracts.

use super::{AccountsChangedCallback, WalletProvider};
use crate::contracts::{IERC20, ILiquidityPair};
use crate::error::{EngineError, Result};
use crate::types::TxConfirmation;
use alloy::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MockToken {
    name: String,
    symbol: String,
    decimals: u8,
    supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

struct MockPair {
    token: Address,
    reserve_native: U256,
    reserve_token: U256,
}

#[derive(Default)]
struct MockChain {
    tokens: HashMap<Address, MockToken>,
    pairs: HashMap<Address, MockPair>,
    native: HashMap<Address, U256>,
    sent: Vec<TransactionRequest>,
    estimate: Option<u64>,
    revert_sends: bool,
}

pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    chain: Mutex<MockChain>,
    listeners: Mutex<Vec<AccountsChangedCallback>>,
}

fn target(tx: &TransactionRequest) -> Result<Address> {
    match tx.to {
        Some(TxKind::Call(to)) => Ok(to),
        _ => Err(EngineError::Rpc("missing call target".into())),
    }
}

fn input(tx: &TransactionRequest) -> &[u8] {
    tx.input.input().map(|b| b.as_ref()).unwrap_or_default()
}

fn reverted() -> EngineError {
    EngineError::Rpc("execution reverted".into())
}

impl MockWallet {
    pub fn new(account: Address) -> Self {
        Self {
            accounts: Mutex::new(vec![account]),
            chain: Mutex::new(MockChain {
                estimate: Some(46_000),
                ..Default::default()
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn disconnected() -> Self {
        let wallet = Self::new(Address::ZERO);
        wallet.accounts.try_lock().unwrap().clear();
        wallet
    }

    pub async fn add_token(
        &self,
        address: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        supply: U256,
    ) {
        let mut chain = self.chain.lock().await;
        let token = chain.tokens.entry(address).or_default();
        token.name = name.into();
        token.symbol = symbol.into();
        token.decimals = decimals;
        token.supply = supply;
    }

    pub async fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        let mut chain = self.chain.lock().await;
        chain.tokens.entry(token).or_default().balances.insert(owner, amount);
    }

    pub async fn set_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) {
        let mut chain = self.chain.lock().await;
        chain
            .tokens
            .entry(token)
            .or_default()
            .allowances
            .insert((owner, spender), amount);
    }

    pub async fn allowance_of(&self, token: Address, owner: Address, spender: Address) -> U256 {
        let chain = self.chain.lock().await;
        chain
            .tokens
            .get(&token)
            .and_then(|t| t.allowances.get(&(owner, spender)).copied())
            .unwrap_or_default()
    }

    pub async fn set_native_balance(&self, owner: Address, amount: U256) {
        self.chain.lock().await.native.insert(owner, amount);
    }

    pub async fn add_pair(
        &self,
        pair: Address,
        token: Address,
        reserve_native: U256,
        reserve_token: U256,
    ) {
        self.chain.lock().await.pairs.insert(
            pair,
            MockPair {
                token,
                reserve_native,
                reserve_token,
            },
        );
    }

    /// `None` makes every gas estimate fail.
    pub async fn set_gas_estimate(&self, estimate: Option<u64>) {
        self.chain.lock().await.estimate = estimate;
    }

    pub async fn set_revert_sends(&self, revert: bool) {
        self.chain.lock().await.revert_sends = revert;
    }

    pub async fn sent(&self) -> Vec<TransactionRequest> {
        self.chain.lock().await.sent.clone()
    }

    pub async fn emit_accounts(&self, accounts: Vec<Address>) {
        *self.accounts.lock().await = accounts.clone();
        let listeners = self.listeners.lock().await.clone();
        for listener in listeners {
            listener(accounts.clone());
        }
    }

    fn answer_token(token: &MockToken, data: &[u8]) -> Result<Vec<u8>> {
        let call = IERC20::IERC20Calls::abi_decode(data, true)?;
        let out = match call {
            IERC20::IERC20Calls::name(_) => {
                IERC20::nameCall::abi_encode_returns(&(token.name.clone(),))
            }
            IERC20::IERC20Calls::symbol(_) => {
                IERC20::symbolCall::abi_encode_returns(&(token.symbol.clone(),))
            }
            IERC20::IERC20Calls::decimals(_) => {
                IERC20::decimalsCall::abi_encode_returns(&(token.decimals,))
            }
            IERC20::IERC20Calls::totalSupply(_) => {
                IERC20::totalSupplyCall::abi_encode_returns(&(token.supply,))
            }
            IERC20::IERC20Calls::balanceOf(c) => IERC20::balanceOfCall::abi_encode_returns(&(
                token.balances.get(&c.owner).copied().unwrap_or_default(),
            )),
            IERC20::IERC20Calls::allowance(c) => IERC20::allowanceCall::abi_encode_returns(&(
                token
                    .allowances
                    .get(&(c.owner, c.spender))
                    .copied()
                    .unwrap_or_default(),
            )),
            IERC20::IERC20Calls::approve(_) => return Err(reverted()),
        };
        Ok(out)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
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
        Ok(self.chain.lock().await.native.get(&owner).copied().unwrap_or_default())
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
        let to = target(&tx)?;
        let chain = self.chain.lock().await;
        if let Some(token) = chain.tokens.get(&to) {
            return Ok(Self::answer_token(token, input(&tx))?.into());
        }
        if let Some(pair) = chain.pairs.get(&to) {
            ILiquidityPair::getReservesCall::abi_decode(input(&tx), true)?;
            return Ok(ILiquidityPair::getReservesCall::abi_encode_returns(&(
                pair.reserve_native,
                pair.reserve_token,
            ))
            .into());
        }
        Err(reverted())
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> Result<u64> {
        self.chain
            .lock()
            .await
            .estimate
            .ok_or_else(|| EngineError::GasEstimation("execution reverted".into()))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxConfirmation> {
        let from = match tx.from {
            Some(from) => from,
            None => self.signer_address().await?,
        };
        let to = target(&tx)?;
        let mut chain = self.chain.lock().await;
        chain.sent.push(tx.clone());
        let tx_hash = TxHash::with_last_byte(chain.sent.len() as u8);

        if chain.revert_sends {
            return Ok(TxConfirmation {
                tx_hash,
                block_number: Some(1),
                success: false,
            });
        }

        if let Ok(approve) = IERC20::approveCall::abi_decode(input(&tx), true) {
            chain
                .tokens
                .entry(to)
                .or_default()
                .allowances
                .insert((from, approve.spender), approve.amount);
        } else if let Ok(add) = ILiquidityPair::addLiquidityCall::abi_decode(input(&tx), true) {
            let value = tx.value.unwrap_or_default();
            let pair_token = {
                let pair = chain.pairs.get_mut(&to).ok_or_else(reverted)?;
                pair.reserve_native += value;
                pair.reserve_token += add.amountToken;
                pair.token
            };
            if let Some(balance) = chain.native.get_mut(&from) {
                *balance = balance.saturating_sub(value);
            }
            if let Some(token) = chain.tokens.get_mut(&pair_token) {
                if let Some(balance) = token.balances.get_mut(&from) {
                    *balance = balance.saturating_sub(add.amountToken);
                }
                if let Some(allowance) = token.allowances.get_mut(&(from, to)) {
                    *allowance = allowance.saturating_sub(add.amountToken);
                }
            }
        }

        Ok(TxConfirmation {
            tx_hash,
            block_number: Some(chain.sent.len() as u64),
            success: true,
        })
    }

    async fn on_accounts_changed(&self, callback: AccountsChangedCallback) {
        self.listeners.lock().await.push(callback);
    }
}
