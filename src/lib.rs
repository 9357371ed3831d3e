pub mod approval;
pub mod config;
pub mod contracts;
pub mod deposit;
pub mod desk;
pub mod discovery;
pub mod error;
pub mod pinning;
pub mod quote;
pub mod registry;
pub mod types;
pub mod wallet;

pub use desk::LiquidityDesk;
pub use error::{EngineError, ErrorKind};
pub use types::{DepositQuote, DepositState, Token};
pub use wallet::{RpcWallet, WalletProvider};
