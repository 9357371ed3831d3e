//! Liquidity deposit attempts.
//!
//! An attempt moves `Idle → Approving → Approved → Depositing → Confirmed`.
//! Any step may end in `Failed`, which, like `Confirmed`, is terminal until
//! [`DepositAttempt::reset`]. Native assets and tokens whose allowance already
//! covers the deposit go straight from `Idle` to `Approved`.

use crate::approval::{ApprovalGate, ApprovalOutcome};
use crate::contracts::LiquidityPair;
use crate::error::{EngineError, Result};
use crate::quote::{from_base_units, is_valid_amount, to_base_units};
use crate::types::{DepositState, PoolReserves, Token, TxConfirmation};
use crate::wallet::WalletProvider;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DepositAttempt {
    state: DepositState,
    last_error: Option<String>,
}

impl Default for DepositAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositAttempt {
    pub fn new() -> Self {
        Self {
            state: DepositState::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> DepositState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start over after `Confirmed` or `Failed`.
    pub fn reset(&mut self) {
        self.state = DepositState::Idle;
        self.last_error = None;
    }

    fn advance(&mut self, to: DepositState) -> Result<()> {
        use DepositState::*;
        let allowed = matches!(
            (self.state, to),
            (Idle, Approving)
                | (Idle, Approved)
                | (Approving, Approved)
                | (Approved, Depositing)
                | (Depositing, Confirmed)
        ) || (to == Failed && !self.state.is_terminal());

        if !allowed {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    fn fail(&mut self, err: EngineError) -> EngineError {
        error!("Deposit attempt failed in {:?}: {}", self.state, err);
        if !self.state.is_terminal() {
            self.state = DepositState::Failed;
        }
        self.last_error = Some(err.to_string());
        err
    }
}

/// Price and liquidity derived from post-deposit reserves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolValuation {
    pub price: f64,
    pub liquidity: f64,
}

/// Token price from the reserve ratio, and pool liquidity with both sides valued
/// in the native asset's reference currency.
pub fn pool_valuation(
    reserves: &PoolReserves,
    native_decimals: u8,
    token_decimals: u8,
    native_price: f64,
) -> PoolValuation {
    let native = from_base_units(reserves.reserve_native, native_decimals);
    let token = from_base_units(reserves.reserve_token, token_decimals);
    let price = if token == 0.0 {
        0.0
    } else {
        (native / token) * native_price
    };
    PoolValuation {
        price,
        liquidity: native * native_price + token * price,
    }
}

#[derive(Debug, Clone)]
pub struct DepositReceipt {
    pub confirmation: TxConfirmation,
    pub reserves: Option<PoolReserves>,
    pub valuation: Option<PoolValuation>,
}

/// Runs the approve and deposit steps of an attempt against the pair contract.
pub struct DepositFlow {
    wallet: Arc<dyn WalletProvider>,
    pair: LiquidityPair,
    gate: ApprovalGate,
}

impl DepositFlow {
    pub fn new(wallet: Arc<dyn WalletProvider>, gate: ApprovalGate) -> Self {
        let pair = LiquidityPair::new(Arc::clone(&wallet), gate.spender());
        Self { wallet, pair, gate }
    }

    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// Approval step. Native tokens skip straight to `Approved`.
    pub async fn approve(
        &self,
        attempt: &mut DepositAttempt,
        token: &Token,
        amount_native: &str,
        amount_token: &str,
    ) -> Result<ApprovalOutcome> {
        if token.is_native() {
            attempt.advance(DepositState::Approved)?;
            return Ok(ApprovalOutcome::NotRequired);
        }
        attempt.advance(DepositState::Approving)?;
        match self.gate.approve(token, amount_native, amount_token).await {
            Ok(outcome) => {
                attempt.advance(DepositState::Approved)?;
                Ok(outcome)
            }
            Err(e) => Err(attempt.fail(e)),
        }
    }

    /// Deposit step: checks allowance and native balance, estimates gas (fatal on
    /// failure), submits `addLiquidity` and reads the new reserves.
    pub async fn deposit(
        &self,
        attempt: &mut DepositAttempt,
        native: &Token,
        token: &Token,
        amount_native: &str,
        amount_token: &str,
    ) -> Result<DepositReceipt> {
        if !matches!(attempt.state(), DepositState::Idle | DepositState::Approved) {
            return Err(EngineError::InvalidTransition {
                from: attempt.state(),
                to: DepositState::Depositing,
            });
        }
        match self
            .submit(attempt, native, token, amount_native, amount_token)
            .await
        {
            Ok(receipt) => Ok(receipt),
            Err(e) => Err(attempt.fail(e)),
        }
    }

    async fn submit(
        &self,
        attempt: &mut DepositAttempt,
        native: &Token,
        token: &Token,
        amount_native: &str,
        amount_token: &str,
    ) -> Result<DepositReceipt> {
        if !is_valid_amount(amount_native) || !is_valid_amount(amount_token) {
            return Err(EngineError::InvalidAmount(format!(
                "{amount_native} / {amount_token}"
            )));
        }

        let owner = self.wallet.signer_address().await?;
        let native_wei = to_base_units(amount_native, native.decimals)?;
        let token_units = to_base_units(amount_token, token.decimals)?;
        info!(
            "Adding liquidity: {}={} ({}), {}={} ({})",
            native.symbol, amount_native, native_wei, token.symbol, amount_token, token_units
        );

        if !token.is_native() {
            let allowance = self.gate.allowance(token, owner).await?;
            info!(
                "Allowance for {}: {}",
                token.symbol,
                from_base_units(allowance, token.decimals)
            );
            if allowance < token_units {
                return Err(EngineError::InsufficientAllowance {
                    symbol: token.symbol.clone(),
                    allowance: from_base_units(allowance, token.decimals).to_string(),
                    required: amount_token.to_string(),
                });
            }
        }
        if attempt.state() == DepositState::Idle {
            attempt.advance(DepositState::Approved)?;
        }

        let balance = self.wallet.native_balance(owner).await?;
        if balance < native_wei {
            return Err(EngineError::InsufficientNativeBalance {
                available: from_base_units(balance, native.decimals).to_string(),
                required: amount_native.to_string(),
            });
        }

        let estimate = self
            .pair
            .estimate_add_liquidity(owner, token_units, native_wei)
            .await?;
        info!("Estimated gas for addLiquidity: {}", estimate);

        attempt.advance(DepositState::Depositing)?;
        let confirmation = self
            .pair
            .add_liquidity(owner, token_units, native_wei)
            .await?;
        if !confirmation.success {
            return Err(EngineError::TransactionReverted {
                tx_hash: confirmation.tx_hash,
            });
        }
        attempt.advance(DepositState::Confirmed)?;
        info!("Liquidity added in {:?}", confirmation.tx_hash);

        let (reserves, valuation) = match self.pair.reserves().await {
            Ok(reserves) => {
                let valuation =
                    pool_valuation(&reserves, native.decimals, token.decimals, native.price);
                (Some(reserves), Some(valuation))
            }
            Err(e) => {
                warn!("Deposit confirmed but reading reserves failed: {}", e);
                (None, None)
            }
        };

        Ok(DepositReceipt {
            confirmation,
            reserves,
            valuation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GasPolicy;
    use crate::registry::native_token;
    use crate::wallet::mock::MockWallet;
    use alloy::primitives::{Address, U256, address};
    use chrono::NaiveDate;

    const OWNER: Address = address!("1000000000000000000000000000000000000001");
    const PAIR: Address = address!("da7057c5f7bc125cbd9dc6d8fe2e9ff4b42a6214");
    const TKN: Address = address!("2000000000000000000000000000000000000002");

    fn tkn() -> Token {
        Token::new(TKN, "TKN", "Test Token", 18, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }

    fn units(whole: u64) -> U256 {
        U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
    }

    async fn setup() -> (Arc<MockWallet>, DepositFlow) {
        let mock = Arc::new(MockWallet::new(OWNER));
        mock.add_token(TKN, "Test Token", "TKN", 18, units(1_000_000)).await;
        mock.set_balance(TKN, OWNER, units(10_000)).await;
        mock.set_native_balance(OWNER, units(5)).await;
        mock.add_pair(PAIR, TKN, units(10), units(26_000)).await;
        let gate = ApprovalGate::new(mock.clone(), PAIR, GasPolicy::default());
        (mock.clone(), DepositFlow::new(mock, gate))
    }

    #[test]
    fn test_transitions() {
        let mut attempt = DepositAttempt::new();
        assert_eq!(attempt.state(), DepositState::Idle);
        assert!(attempt.advance(DepositState::Depositing).is_err());
        attempt.advance(DepositState::Approving).unwrap();
        attempt.advance(DepositState::Approved).unwrap();
        attempt.advance(DepositState::Depositing).unwrap();
        attempt.advance(DepositState::Confirmed).unwrap();
        assert!(attempt.advance(DepositState::Failed).is_err());

        attempt.reset();
        attempt.advance(DepositState::Failed).unwrap();
        assert!(attempt.advance(DepositState::Approving).is_err());
    }

    #[test]
    fn test_pool_valuation() {
        let reserves = PoolReserves {
            reserve_native: units(10),
            reserve_token: units(26_000),
        };
        let v = pool_valuation(&reserves, 18, 18, 2600.0);
        assert!((v.price - 1.0).abs() < 1e-9);
        assert!((v.liquidity - 52_000.0).abs() < 1e-6);

        let empty = PoolReserves {
            reserve_native: units(1),
            reserve_token: U256::ZERO,
        };
        let v = pool_valuation(&empty, 18, 18, 2600.0);
        assert_eq!(v.price, 0.0);
        assert!((v.liquidity - 2600.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_full_attempt_confirms_and_values_pool() {
        let (mock, flow) = setup().await;
        let mut attempt = DepositAttempt::new();

        flow.approve(&mut attempt, &tkn(), "1", "2600.000000").await.unwrap();
        assert_eq!(attempt.state(), DepositState::Approved);

        let receipt = flow
            .deposit(&mut attempt, &native_token(), &tkn(), "1", "2600.000000")
            .await
            .unwrap();
        assert_eq!(attempt.state(), DepositState::Confirmed);
        assert!(receipt.confirmation.success);

        let reserves = receipt.reserves.unwrap();
        assert_eq!(reserves.reserve_native, units(11));
        assert_eq!(reserves.reserve_token, units(28_600));
        let valuation = receipt.valuation.unwrap();
        assert!((valuation.price - 1.0).abs() < 1e-9);

        let sent = mock.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].value, Some(units(1)));
    }

    #[tokio::test]
    async fn test_insufficient_allowance_fails_before_submission() {
        let (mock, flow) = setup().await;
        mock.set_allowance(TKN, OWNER, PAIR, units(100)).await;
        let mut attempt = DepositAttempt::new();

        let err = flow
            .deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientAllowance { .. }));
        assert_eq!(attempt.state(), DepositState::Failed);
        assert!(attempt.last_error().is_some());
        assert!(mock.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_allowance_skips_approval() {
        let (mock, flow) = setup().await;
        mock.set_allowance(TKN, OWNER, PAIR, units(3000)).await;
        let mut attempt = DepositAttempt::new();

        flow.deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap();
        assert_eq!(attempt.state(), DepositState::Confirmed);
        assert_eq!(mock.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_native_balance() {
        let (mock, flow) = setup().await;
        mock.set_allowance(TKN, OWNER, PAIR, units(30_000)).await;
        let mut attempt = DepositAttempt::new();

        let err = flow
            .deposit(&mut attempt, &native_token(), &tkn(), "6", "15600")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientNativeBalance { .. }));
        assert!(mock.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_gas_estimation_failure_is_fatal() {
        let (mock, flow) = setup().await;
        mock.set_allowance(TKN, OWNER, PAIR, units(3000)).await;
        mock.set_gas_estimate(None).await;
        let mut attempt = DepositAttempt::new();

        let err = flow
            .deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::GasEstimation(_)));
        assert_eq!(attempt.state(), DepositState::Failed);
        assert!(mock.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_attempt_requires_reset() {
        let (mock, flow) = setup().await;
        let mut attempt = DepositAttempt::new();
        flow.deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap_err();

        mock.set_allowance(TKN, OWNER, PAIR, units(3000)).await;
        let err = flow
            .deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));

        attempt.reset();
        flow.deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap();
        assert_eq!(attempt.state(), DepositState::Confirmed);
    }

    #[tokio::test]
    async fn test_dust_token_amount_fails_before_submission() {
        let (mock, flow) = setup().await;
        let usdc = address!("3000000000000000000000000000000000000003");
        mock.add_token(usdc, "USD Coin", "USDC", 6, U256::from(1_000_000_000u64)).await;
        let created = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let token = Token::new(usdc, "USDC", "USD Coin", 6, created);
        let mut attempt = DepositAttempt::new();

        let err = flow
            .deposit(&mut attempt, &native_token(), &token, "1", "0.0000001")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
        assert_eq!(attempt.state(), DepositState::Failed);
        assert!(mock.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_reverted_deposit_fails_attempt() {
        let (mock, flow) = setup().await;
        mock.set_allowance(TKN, OWNER, PAIR, units(3000)).await;
        mock.set_revert_sends(true).await;
        let mut attempt = DepositAttempt::new();

        let err = flow
            .deposit(&mut attempt, &native_token(), &tkn(), "1", "2600")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TransactionReverted { .. }));
        assert_eq!(attempt.state(), DepositState::Failed);
    }
}
