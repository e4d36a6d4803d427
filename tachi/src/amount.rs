//! USDC amounts.
//!
//! Prices are configured as human-readable decimal strings (`"0.001"`) but
//! every comparison on the payment path uses integer base units on 6
//! decimals (`1 USDC = 1_000_000 base units`). The conversion happens once,
//! at configuration time, and both forms travel together afterwards.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Number of decimal places of the USDC token.
pub const USDC_DECIMALS: u32 = 6;

/// A non-negative USDC amount holding both the human decimal form and the
/// integer base-unit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcAmount {
    decimal: Decimal,
    base_units: u64,
}

impl UsdcAmount {
    /// Builds an amount from integer base units.
    #[must_use]
    pub fn from_base_units(base_units: u64) -> Self {
        let mut decimal = Decimal::from(base_units);
        decimal.set_scale(USDC_DECIMALS).expect("scale is in range");
        Self {
            decimal: decimal.normalize(),
            base_units,
        }
    }

    /// The amount in base units.
    #[must_use]
    pub const fn base_units(&self) -> u64 {
        self.base_units
    }

    /// The amount as a decimal value.
    #[must_use]
    pub const fn decimal(&self) -> Decimal {
        self.decimal
    }
}

impl fmt::Display for UsdcAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.decimal)
    }
}

impl FromStr for UsdcAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim()).map_err(|_| AmountError::Invalid)?;
        if decimal.is_sign_negative() {
            return Err(AmountError::Negative);
        }
        let scale = decimal.normalize().scale();
        if scale > USDC_DECIMALS {
            return Err(AmountError::TooPrecise { scale });
        }
        let base_units = (decimal * Decimal::from(10u64.pow(USDC_DECIMALS)))
            .to_u64()
            .ok_or(AmountError::Overflow)?;
        Ok(Self {
            decimal: decimal.normalize(),
            base_units,
        })
    }
}

/// Why a configured amount string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Not a decimal number.
    #[error("not a valid decimal amount")]
    Invalid,
    /// Negative prices are meaningless.
    #[error("amount must not be negative")]
    Negative,
    /// More fractional digits than USDC can represent.
    #[error("amount has {scale} fractional digits, USDC supports at most 6")]
    TooPrecise {
        /// Number of fractional digits in the input.
        scale: u32,
    },
    /// Base-unit value does not fit a 64-bit integer.
    #[error("amount is too large")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fractional() {
        let amount: UsdcAmount = "0.001".parse().unwrap();
        assert_eq!(amount.base_units(), 1_000);
        assert_eq!(amount.to_string(), "0.001");
    }

    #[test]
    fn test_parse_whole() {
        let amount: UsdcAmount = "2".parse().unwrap();
        assert_eq!(amount.base_units(), 2_000_000);
        assert_eq!(amount.to_string(), "2");
    }

    #[test]
    fn test_parse_six_decimals() {
        let amount: UsdcAmount = "0.000001".parse().unwrap();
        assert_eq!(amount.base_units(), 1);
    }

    #[test]
    fn test_trailing_zeros_normalize() {
        let amount: UsdcAmount = "0.0010".parse().unwrap();
        assert_eq!(amount.base_units(), 1_000);
        assert_eq!(amount.to_string(), "0.001");
    }

    #[test]
    fn test_rejects_seven_decimals() {
        assert_eq!(
            "0.0000001".parse::<UsdcAmount>(),
            Err(AmountError::TooPrecise { scale: 7 })
        );
    }

    #[test]
    fn test_rejects_negative() {
        assert_eq!("-1".parse::<UsdcAmount>(), Err(AmountError::Negative));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!("one".parse::<UsdcAmount>(), Err(AmountError::Invalid));
    }

    #[test]
    fn test_from_base_units() {
        let amount = UsdcAmount::from_base_units(1_500_000);
        assert_eq!(amount.to_string(), "1.5");
        assert_eq!(amount.base_units(), 1_500_000);
    }
}
