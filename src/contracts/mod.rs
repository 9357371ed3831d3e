//! ABI bindings for the token and pair contracts, driven through a [`WalletProvider`].

use crate::error::{EngineError, Result};
use crate::types::{PoolReserves, TxConfirmation};
use crate::wallet::WalletProvider;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use std::sync::Arc;

sol! {
    interface IERC20 {
        function name() external view returns (string name);
        function symbol() external view returns (string symbol);
        function decimals() external view returns (uint8 decimals);
        function totalSupply() external view returns (uint256 supply);
        function balanceOf(address owner) external view returns (uint256 balance);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function approve(address spender, uint256 amount) external returns (bool success);
    }

    interface ILiquidityPair {
        function addLiquidity(uint256 amountToken) external payable;
        function getReserves() external view returns (uint256 reserveNative, uint256 reserveToken);
    }
}

/// Metadata read from a token contract.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: U256,
}

async fn read<C: SolCall>(wallet: &dyn WalletProvider, to: Address, call: C) -> Result<C::Return> {
    let tx = TransactionRequest::default()
        .with_to(to)
        .with_input(call.abi_encode());
    let output = wallet.call(tx).await?;
    Ok(C::abi_decode_returns(&output, true)?)
}

/// Fungible token at `address`.
#[derive(Clone)]
pub struct Erc20 {
    wallet: Arc<dyn WalletProvider>,
    address: Address,
}

impl Erc20 {
    pub fn new(wallet: Arc<dyn WalletProvider>, address: Address) -> Self {
        Self { wallet, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        let ret = read(&*self.wallet, self.address, IERC20::balanceOfCall { owner }).await?;
        Ok(ret.balance)
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        let ret = read(
            &*self.wallet,
            self.address,
            IERC20::allowanceCall { owner, spender },
        )
        .await?;
        Ok(ret.remaining)
    }

    /// All four metadata reads run concurrently; any failure means "not an ERC-20".
    pub async fn metadata(&self) -> Result<TokenMetadata> {
        let wallet = &*self.wallet;
        let (name, symbol, decimals, supply) = futures::try_join!(
            read(wallet, self.address, IERC20::nameCall {}),
            read(wallet, self.address, IERC20::symbolCall {}),
            read(wallet, self.address, IERC20::decimalsCall {}),
            read(wallet, self.address, IERC20::totalSupplyCall {}),
        )?;
        Ok(TokenMetadata {
            name: name.name,
            symbol: symbol.symbol,
            decimals: decimals.decimals,
            total_supply: supply.supply,
        })
    }

    fn approve_tx(&self, from: Address, spender: Address, amount: U256) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(self.address)
            .with_input(IERC20::approveCall { spender, amount }.abi_encode())
    }

    pub async fn estimate_approve(
        &self,
        from: Address,
        spender: Address,
        amount: U256,
    ) -> Result<u64> {
        self.wallet
            .estimate_gas(self.approve_tx(from, spender, amount))
            .await
    }

    pub async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: U256,
        gas_limit: u64,
    ) -> Result<TxConfirmation> {
        let tx = self.approve_tx(from, spender, amount).with_gas_limit(gas_limit);
        self.wallet.send_transaction(tx).await
    }
}

/// Native/token liquidity pair at `address`.
#[derive(Clone)]
pub struct LiquidityPair {
    wallet: Arc<dyn WalletProvider>,
    address: Address,
}

impl LiquidityPair {
    pub fn new(wallet: Arc<dyn WalletProvider>, address: Address) -> Self {
        Self { wallet, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn add_liquidity_tx(
        &self,
        from: Address,
        amount_token: U256,
        value: U256,
    ) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(self.address)
            .with_value(value)
            .with_input(ILiquidityPair::addLiquidityCall { amountToken: amount_token }.abi_encode())
    }

    pub async fn estimate_add_liquidity(
        &self,
        from: Address,
        amount_token: U256,
        value: U256,
    ) -> Result<u64> {
        self.wallet
            .estimate_gas(self.add_liquidity_tx(from, amount_token, value))
            .await
            .map_err(|e| match e {
                EngineError::GasEstimation(_) => e,
                other => EngineError::GasEstimation(other.to_string()),
            })
    }

    pub async fn add_liquidity(
        &self,
        from: Address,
        amount_token: U256,
        value: U256,
    ) -> Result<TxConfirmation> {
        self.wallet
            .send_transaction(self.add_liquidity_tx(from, amount_token, value))
            .await
    }

    pub async fn reserves(&self) -> Result<PoolReserves> {
        let ret = read(&*self.wallet, self.address, ILiquidityPair::getReservesCall {}).await?;
        Ok(PoolReserves {
            reserve_native: ret.reserveNative,
            reserve_token: ret.reserveToken,
        })
    }
}
