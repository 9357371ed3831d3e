//! Paired-amount quoting for liquidity deposits.
//!
//! Quotes are recomputed on every input change and are cleared, not errored,
//! when the inputs cannot produce a meaningful amount.

use alloy::primitives::U256;
use alloy::primitives::utils::parse_units;

use crate::error::{EngineError, Result};
use crate::types::DepositQuote;

/// Fractional digits of a derived amount.
pub const QUOTE_PRECISION: usize = 6;

/// True iff `amount` is non-empty, parses to a finite number and is strictly positive.
pub fn is_valid_amount(amount: &str) -> bool {
    parse_amount(amount).is_some()
}

fn parse_amount(amount: &str) -> Option<f64> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn positive_price(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

/// Derive amount B from amount A at the `price_a / price_b` reference rate.
pub fn quote(amount_a: &str, price_a: Option<f64>, price_b: Option<f64>) -> DepositQuote {
    let derived = match (
        parse_amount(amount_a),
        positive_price(price_a),
        positive_price(price_b),
    ) {
        (Some(a), Some(pa), Some(pb)) => format!("{:.*}", QUOTE_PRECISION, a * (pa / pb)),
        _ => String::new(),
    };

    DepositQuote {
        amount_a: amount_a.to_string(),
        amount_b: derived,
    }
}

/// Rate shown as "1 A = r B".
pub fn exchange_rate(price_a: f64, price_b: f64) -> Option<f64> {
    if price_b > 0.0 && price_b.is_finite() {
        Some(price_a / price_b)
    } else {
        None
    }
}

/// Geometric-mean LP share preview for a deposit of `amount_a` and `amount_b`.
pub fn estimate_lp_tokens(amount_a: &str, amount_b: &str) -> Option<f64> {
    let a = parse_amount(amount_a)?;
    let b = parse_amount(amount_b)?;
    Some((a * b).sqrt())
}

/// Convert a decimal amount to base units. Digits beyond `decimals` are truncated.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<U256> {
    if !is_valid_amount(amount) {
        return Err(EngineError::InvalidAmount(amount.to_string()));
    }
    let trimmed = amount.trim();
    let normalized = match trimmed.split_once('.') {
        Some((whole, frac)) if frac.len() > decimals as usize => {
            if decimals == 0 {
                whole.to_string()
            } else {
                format!("{}.{}", whole, &frac[..decimals as usize])
            }
        }
        _ => trimmed.to_string(),
    };

    let units = parse_units(&normalized, decimals)
        .map(|units| units.get_absolute())
        .map_err(|e| EngineError::InvalidAmount(format!("{amount}: {e}")))?;
    if units.is_zero() {
        return Err(EngineError::InvalidAmount(format!(
            "{amount}: below the smallest unit of a {decimals}-decimal token"
        )));
    }
    Ok(units)
}

/// Lossy conversion of base units to whole-token units.
pub fn from_base_units(value: U256, decimals: u8) -> f64 {
    let raw = value.to_string().parse::<f64>().unwrap_or(0.0);
    raw / 10f64.powi(decimals as i32)
}
