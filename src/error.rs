use alloy::primitives::{Address, TxHash};
use thiserror::Error;

use crate::types::DepositState;

/// Coarse classification the presentation layer switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserInputInvalid,
    WalletUnavailable,
    InsufficientFunds,
    GasEstimationFailure,
    TransactionRejectedOrReverted,
    External,
}

/// Errors produced by quoting, approval, deposit and discovery operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no wallet account available")]
    WalletUnavailable,

    #[error("insufficient balance of {symbol}: have {available}, need {required}")]
    InsufficientBalance {
        symbol: String,
        available: String,
        required: String,
    },

    #[error("insufficient native balance: have {available}, need {required}")]
    InsufficientNativeBalance { available: String, required: String },

    #[error("insufficient allowance for {symbol}: approved {allowance}, need {required}")]
    InsufficientAllowance {
        symbol: String,
        allowance: String,
        required: String,
    },

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: TxHash },

    #[error("unknown token {0}")]
    UnknownToken(Address),

    #[error("deposit attempt cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: DepositState, to: DepositState },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("abi decode error: {0}")]
    Decode(String),

    #[error("explorer error: {0}")]
    Explorer(String),

    #[error("pinning service error: {0}")]
    Pinning(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidAmount(_) | EngineError::InvalidInput(_) => {
                ErrorKind::UserInputInvalid
            }
            EngineError::WalletUnavailable => ErrorKind::WalletUnavailable,
            EngineError::InsufficientBalance { .. }
            | EngineError::InsufficientNativeBalance { .. }
            | EngineError::InsufficientAllowance { .. } => ErrorKind::InsufficientFunds,
            EngineError::GasEstimation(_) => ErrorKind::GasEstimationFailure,
            EngineError::TransactionRejected(_) | EngineError::TransactionReverted { .. } => {
                ErrorKind::TransactionRejectedOrReverted
            }
            EngineError::UnknownToken(_)
            | EngineError::InvalidTransition { .. }
            | EngineError::Rpc(_)
            | EngineError::Decode(_)
            | EngineError::Explorer(_)
            | EngineError::Pinning(_)
            | EngineError::Http(_) => ErrorKind::External,
        }
    }
}

impl From<alloy::transports::TransportError> for EngineError {
    fn from(err: alloy::transports::TransportError) -> Self {
        EngineError::Rpc(err.to_string())
    }
}

impl From<alloy::sol_types::Error> for EngineError {
    fn from(err: alloy::sol_types::Error) -> Self {
        EngineError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
