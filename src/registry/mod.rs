use crate::types::{NATIVE_ADDRESS, SortKey, Token};
use alloy::primitives::Address;
use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Reference price of the native asset until a market source overrides it.
pub const NATIVE_REFERENCE_PRICE: f64 = 2600.0;

/// Built-in entry for the chain's native asset.
pub fn native_token() -> Token {
    Token {
        symbol: "ETH".to_string(),
        name: "Sepolia Ether".to_string(),
        contract_address: NATIVE_ADDRESS,
        decimals: 18,
        price: NATIVE_REFERENCE_PRICE,
        liquidity: 10_000_000.0,
        volume_24h: 2_000_000.0,
        total_supply: 0.0,
        created: NaiveDate::from_ymd_opt(2021, 10, 1).unwrap_or_default(),
    }
}

fn is_usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// In-memory list of known tokens, at most one entry per contract address.
/// The native entry is always first.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: Vec<Token>,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: vec![native_token()],
        }
    }

    /// Falls back to [`NATIVE_REFERENCE_PRICE`] when `price` is not a positive finite number.
    pub fn with_native_price(price: f64) -> Self {
        let mut registry = Self::new();
        if is_usable_price(price) {
            registry.tokens[0].price = price;
        } else {
            warn!("Ignoring native price {}; keeping {}", price, NATIVE_REFERENCE_PRICE);
        }
        registry
    }

    /// Insert or replace by contract address (last write wins, position kept).
    /// Only market fields of the native entry can change, and its price only to a
    /// positive finite value.
    pub fn upsert(&mut self, token: Token) {
        match self
            .tokens
            .iter_mut()
            .find(|t| t.contract_address == token.contract_address)
        {
            Some(existing) if existing.is_native() => {
                if is_usable_price(token.price) {
                    existing.price = token.price;
                } else {
                    warn!("Ignoring native price update {}", token.price);
                }
                existing.liquidity = token.liquidity;
                existing.volume_24h = token.volume_24h;
            }
            Some(existing) => {
                debug!("Replacing registry entry for {}", token.contract_address);
                *existing = token;
            }
            None => self.tokens.push(token),
        }
    }

    pub fn merge(&mut self, tokens: impl IntoIterator<Item = Token>) {
        for token in tokens {
            self.upsert(token);
        }
    }

    /// Apply post-deposit pool valuation. Returns false for unknown addresses.
    pub fn update_liquidity(&mut self, address: Address, liquidity: f64, price: f64) -> bool {
        match self
            .tokens
            .iter_mut()
            .find(|t| t.contract_address == address)
        {
            Some(token) => {
                token.liquidity = liquidity;
                token.price = price;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, address: Address) -> Option<&Token> {
        self.tokens.iter().find(|t| t.contract_address == address)
    }

    pub fn native(&self) -> &Token {
        &self.tokens[0]
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Drop everything except the native entry, restoring its defaults.
    pub fn reset(&mut self) {
        let price = self.native().price;
        self.tokens = vec![native_token()];
        self.tokens[0].price = price;
    }

    /// Case-insensitive name/symbol filter, sorted descending by `sort`.
    pub fn search(&self, term: &str, sort: SortKey) -> Vec<Token> {
        let needle = term.to_lowercase();
        let mut found: Vec<Token> = self
            .tokens
            .iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle) || t.symbol.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| match sort {
            SortKey::Price => desc(a.price, b.price),
            SortKey::Liquidity => desc(a.liquidity, b.liquidity),
            SortKey::Volume => desc(a.volume_24h, b.volume_24h),
            SortKey::TotalSupply => desc(a.total_supply, b.total_supply),
            SortKey::Created => b.created.cmp(&a.created),
        });
        found
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
