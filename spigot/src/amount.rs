//! Human-readable asset amount parsing.
//!
//! Grant sizes are configured as decimal strings (`"0.5"`, `"500"`) and
//! converted to base units once at startup using the asset's decimals.
//! Balances are formatted back to decimal strings for chat replies.

use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::Decimal;

/// Errors produced while converting a decimal amount to base units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The input is not a decimal number.
    #[error("invalid amount {0:?}")]
    Invalid(String),
    /// The amount is negative.
    #[error("amount {0:?} is negative")]
    Negative(String),
    /// The amount is zero.
    #[error("amount must be greater than zero")]
    Zero,
    /// The amount has more fractional digits than the asset supports.
    #[error("amount {amount:?} has more than {decimals} decimal places")]
    TooPrecise {
        /// The offending input.
        amount: String,
        /// Decimals supported by the asset.
        decimals: u8,
    },
    /// The amount does not fit in 256 bits once scaled.
    #[error("amount {0:?} is out of range")]
    Overflow(String),
}

/// Parses a decimal string into base units for an asset with `decimals`
/// fractional digits.
///
/// ```rust
/// use alloy_primitives::U256;
/// use spigot::amount::parse_units;
///
/// let wei = parse_units("0.5", 18).unwrap();
/// assert_eq!(wei, U256::from(500_000_000_000_000_000u128));
/// ```
///
/// # Errors
///
/// Returns [`AmountError`] if the input is malformed, negative, zero, too
/// precise for `decimals`, or overflows.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = input.trim();
    let value =
        Decimal::from_str(trimmed).map_err(|_| AmountError::Invalid(trimmed.to_owned()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative(trimmed.to_owned()));
    }
    if value.is_zero() {
        return Err(AmountError::Zero);
    }

    let value = value.normalize();
    let scale = value.scale();
    if scale > u32::from(decimals) {
        return Err(AmountError::TooPrecise {
            amount: trimmed.to_owned(),
            decimals,
        });
    }

    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| AmountError::Invalid(trimmed.to_owned()))?;
    let multiplier = U256::from(10u8)
        .checked_pow(U256::from(u32::from(decimals) - scale))
        .ok_or_else(|| AmountError::Overflow(trimmed.to_owned()))?;
    U256::from(mantissa)
        .checked_mul(multiplier)
        .ok_or_else(|| AmountError::Overflow(trimmed.to_owned()))
}

/// Formats base units as a decimal string with trailing zeros removed.
///
/// ```rust
/// use alloy_primitives::U256;
/// use spigot::amount::format_units;
///
/// assert_eq!(format_units(U256::from(1_500_000_000u64), 9), "1.5");
/// ```
#[must_use]
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    // 10^78 exceeds U256::MAX, so every value is a pure fraction there.
    let (whole, fraction) = match U256::from(10u8).checked_pow(U256::from(decimals)) {
        Some(divisor) => (value / divisor, value % divisor),
        None => (U256::ZERO, value),
    };
    if fraction.is_zero() {
        return whole.to_string();
    }
    let width = usize::from(decimals);
    let padded = format!("{:0>width$}", fraction.to_string());
    format!("{whole}.{}", padded.trim_end_matches('0'))
}
