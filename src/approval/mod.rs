use crate::config::GasPolicy;
use crate::contracts::Erc20;
use crate::error::{EngineError, Result};
use crate::quote::{from_base_units, is_valid_amount, to_base_units};
use crate::types::{Token, TxConfirmation};
use crate::wallet::WalletProvider;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Native asset; nothing to authorize.
    NotRequired,
    Approved {
        confirmation: TxConfirmation,
        gas_limit: u64,
    },
}

/// Authorizes the pair contract to pull a token before a deposit.
pub struct ApprovalGate {
    wallet: Arc<dyn WalletProvider>,
    spender: Address,
    gas: GasPolicy,
}

impl ApprovalGate {
    pub fn new(wallet: Arc<dyn WalletProvider>, spender: Address, gas: GasPolicy) -> Self {
        Self {
            wallet,
            spender,
            gas,
        }
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    /// Grant `spender` an allowance of `amount_b` of `token`, waiting for confirmation.
    /// Each call submits a fresh transaction, even if the allowance already suffices.
    pub async fn approve(
        &self,
        token: &Token,
        amount_a: &str,
        amount_b: &str,
    ) -> Result<ApprovalOutcome> {
        if !is_valid_amount(amount_a) || !is_valid_amount(amount_b) {
            warn!("Rejecting approval with amounts {:?} / {:?}", amount_a, amount_b);
            return Err(EngineError::InvalidAmount(format!("{amount_a} / {amount_b}")));
        }
        if token.is_native() {
            info!("{} does not require approval", token.symbol);
            return Ok(ApprovalOutcome::NotRequired);
        }

        let owner = self.wallet.signer_address().await?;
        let contract = Erc20::new(Arc::clone(&self.wallet), token.contract_address);
        let amount = to_base_units(amount_b, token.decimals)?;

        let balance = contract.balance_of(owner).await?;
        info!(
            "Balance of {}: {}",
            token.symbol,
            from_base_units(balance, token.decimals)
        );
        if balance < amount {
            let err = EngineError::InsufficientBalance {
                symbol: token.symbol.clone(),
                available: from_base_units(balance, token.decimals).to_string(),
                required: amount_b.to_string(),
            };
            warn!("{}", err);
            return Err(err);
        }

        let estimate = match contract.estimate_approve(owner, self.spender, amount).await {
            Ok(estimate) => {
                info!("Estimated gas for approve: {}", estimate);
                estimate
            }
            Err(e) => {
                warn!(
                    "Gas estimation for approve failed ({}); using {}",
                    e, self.gas.fallback_approve_gas
                );
                self.gas.fallback_approve_gas
            }
        };
        let gas_limit = self.gas.limit_for(estimate);

        let confirmation = contract
            .approve(owner, self.spender, amount, gas_limit)
            .await
            .inspect_err(|e| error!("Approve of {} failed: {}", token.symbol, e))?;
        if !confirmation.success {
            error!("Approve transaction {:?} reverted", confirmation.tx_hash);
            return Err(EngineError::TransactionReverted {
                tx_hash: confirmation.tx_hash,
            });
        }

        info!("Approved {} {} for {:?}", amount_b, token.symbol, self.spender);
        Ok(ApprovalOutcome::Approved {
            confirmation,
            gas_limit,
        })
    }

    /// Read-only check that the current allowance covers `amount`.
    pub async fn allowance_sufficient(
        &self,
        token: &Token,
        owner: Address,
        amount: U256,
    ) -> Result<bool> {
        if token.is_native() {
            return Ok(true);
        }
        let allowance = Erc20::new(Arc::clone(&self.wallet), token.contract_address)
            .allowance(owner, self.spender)
            .await?;
        Ok(allowance >= amount)
    }

    pub async fn allowance(&self, token: &Token, owner: Address) -> Result<U256> {
        Erc20::new(Arc::clone(&self.wallet), token.contract_address)
            .allowance(owner, self.spender)
            .await
    }
}
