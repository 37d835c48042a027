//! Integer amount arithmetic
//!
//! Every balance, amount and fee is an [`Amount`] in the smallest
//! denomination. Nothing in this module touches floating point: human input
//! such as `"1.5"` is parsed digit by digit and fee products use checked
//! multiplication.

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};
use crate::types::Amount;

/// Number of fractional digits of the native token
pub const NATIVE_DECIMALS: u32 = 18;

/// How much the user asked to transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum AmountRequest {
    /// An explicit amount
    Exact(Amount),
    /// Drain the address: balance minus the fee
    Remaining,
}

/// Fee of a single transaction, `gas_amount * gas_price`
pub fn fee_for(gas_amount: u64, gas_price: Amount) -> PipelineResult<Amount> {
    Amount::from(gas_amount)
        .checked_mul(gas_price)
        .ok_or(PipelineError::Overflow("fee"))
}

/// Amount actually transferred once the fee is known
///
/// Fails when a drain would leave nothing (or less than nothing) to send.
pub fn resolve_amount(request: AmountRequest, balance: Amount, fee: Amount) -> PipelineResult<Amount> {
    match request {
        AmountRequest::Exact(amount) => Ok(amount),
        AmountRequest::Remaining => match balance.checked_sub(fee) {
            Some(rest) if rest > 0 => Ok(rest),
            _ => Err(PipelineError::validation(format!(
                "fee {} leaves nothing to send from a balance of {}",
                fee, balance
            ))),
        },
    }
}

/// Check `0 < amount <= balance`
pub fn check_within_range(amount: Amount, balance: Amount) -> PipelineResult<()> {
    if amount == 0 {
        return Err(PipelineError::validation("amount must be greater than zero"));
    }
    if amount > balance {
        return Err(PipelineError::validation(format!(
            "amount {} exceeds available balance {}",
            amount, balance
        )));
    }
    Ok(())
}

/// Parse a human-readable decimal amount into smallest units
///
/// Accepts `"12"`, `"0.5"`, `".5"` and `"1_000.25"` style input; rejects
/// signs, exponents and more than `decimals` fractional digits.
pub fn parse_amount(text: &str, decimals: u32) -> PipelineResult<Amount> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(PipelineError::validation("amount is empty"));
    }

    let (whole, fraction) = match cleaned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (cleaned.as_str(), ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(PipelineError::validation(format!("invalid amount `{}`", text)));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(PipelineError::validation(format!("invalid amount `{}`", text)));
    }
    if fraction.len() > decimals as usize {
        return Err(PipelineError::validation(format!(
            "amount `{}` has more than {} decimal places",
            text, decimals
        )));
    }

    let scale = pow10(decimals)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<Amount>()
            .map_err(|_| PipelineError::Overflow("amount"))?
    };

    let mut fraction_units: Amount = 0;
    for digit in fraction.chars().chain(std::iter::repeat('0')).take(decimals as usize) {
        fraction_units = fraction_units * 10 + Amount::from(digit as u8 - b'0');
    }

    whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or(PipelineError::Overflow("amount"))
}

/// Render smallest units as a decimal string without trailing zeros
pub fn format_amount(amount: Amount, decimals: u32) -> String {
    let scale = match pow10(decimals) {
        Ok(scale) => scale,
        Err(_) => return amount.to_string(),
    };
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

fn pow10(decimals: u32) -> PipelineResult<Amount> {
    (10 as Amount)
        .checked_pow(decimals)
        .ok_or(PipelineError::Overflow("decimal scale"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ONE: Amount = 1_000_000_000_000_000_000;

    #[test]
    fn test_fee_is_exact_product() {
        assert_eq!(fee_for(20_000, 1).unwrap(), 20_000);
        assert_eq!(fee_for(20_000, 100_000_000_000).unwrap(), 2_000_000_000_000_000);
        assert_eq!(fee_for(2, Amount::MAX), Err(PipelineError::Overflow("fee")));
    }

    #[test]
    fn test_resolve_remaining_balance() {
        assert_eq!(resolve_amount(AmountRequest::Remaining, 1_000, 200).unwrap(), 800);
        assert_eq!(resolve_amount(AmountRequest::Exact(5), 1_000, 200).unwrap(), 5);
        assert!(resolve_amount(AmountRequest::Remaining, 1_000, 1_000).is_err());
        assert!(resolve_amount(AmountRequest::Remaining, 1_000, 1_001).is_err());
    }

    #[test]
    fn test_range_check() {
        assert!(check_within_range(1, 1).is_ok());
        assert!(check_within_range(0, 10).is_err());
        assert!(check_within_range(11, 10).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1", NATIVE_DECIMALS).unwrap(), ONE);
        assert_eq!(parse_amount("1.5", NATIVE_DECIMALS).unwrap(), ONE + ONE / 2);
        assert_eq!(parse_amount(".25", NATIVE_DECIMALS).unwrap(), ONE / 4);
        assert_eq!(parse_amount("1_000", 2).unwrap(), 100_000);
        assert_eq!(parse_amount("0.000000000000000001", NATIVE_DECIMALS).unwrap(), 1);

        assert!(parse_amount("", NATIVE_DECIMALS).is_err());
        assert!(parse_amount(".", NATIVE_DECIMALS).is_err());
        assert!(parse_amount("-1", NATIVE_DECIMALS).is_err());
        assert!(parse_amount("1e5", NATIVE_DECIMALS).is_err());
        assert!(parse_amount("0.123", 2).is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(ONE, NATIVE_DECIMALS), "1");
        assert_eq!(format_amount(ONE + ONE / 2, NATIVE_DECIMALS), "1.5");
        assert_eq!(format_amount(1, NATIVE_DECIMALS), "0.000000000000000001");
        assert_eq!(format_amount(0, NATIVE_DECIMALS), "0");
    }

    proptest! {
        #[test]
        fn prop_remaining_is_balance_minus_fee(balance in 1u128..u64::MAX as u128, fee in 0u128..u64::MAX as u128) {
            let resolved = resolve_amount(AmountRequest::Remaining, balance, fee);
            if fee >= balance {
                prop_assert!(resolved.is_err());
            } else {
                prop_assert_eq!(resolved.unwrap(), balance - fee);
            }
        }
    }
}
