//! Conversion between on-chain base units and display units.

use crate::errors::{Result, WalletError};
use rust_decimal::Decimal;

/// Largest mantissa and significant digits a [`Decimal`] holds.
const MAX_MANTISSA: u128 = (1 << 96) - 1;
const MAX_DIGITS: u32 = 28;

/// Converts an integer amount of base units (satoshi, wei, ...) into a
/// display-unit decimal.
///
/// Accepts plain decimal strings and `0x`-prefixed hex strings. Sub-unit
/// digits that do not fit are rounded half away from zero; only a whole part
/// beyond the `Decimal` range is an error.
pub fn from_base_units(raw: &str, decimals: u32) -> Result<Decimal> {
	let raw = raw.trim();
	let value = match raw.strip_prefix("0x") {
		Some(hex) if hex.is_empty() => 0,
		Some(hex) => i128::from_str_radix(hex, 16).map_err(|e| {
			WalletError::upstream_data(format!("Invalid hex amount '{}': {}", raw, e))
		})?,
		None => raw.parse::<i128>().map_err(|e| {
			WalletError::upstream_data(format!("Invalid amount '{}': {}", raw, e))
		})?,
	};

	let out_of_range = |e: rust_decimal::Error| {
		WalletError::upstream_data(format!("Amount '{}' out of range: {}", raw, e))
	};

	let (whole, mut fraction, mut scale) = match 10i128.checked_pow(decimals) {
		Some(unit) => (value / unit, value % unit, decimals),
		None => (0, value, decimals),
	};
	// Keep whole and fractional digits together within a Decimal's precision.
	let whole_digits = whole.unsigned_abs().checked_ilog10().map_or(0, |d| d + 1);
	let max_scale = MAX_DIGITS.saturating_sub(whole_digits);
	while scale > max_scale || fraction.unsigned_abs() > MAX_MANTISSA {
		fraction = (fraction + 5 * fraction.signum()) / 10;
		scale -= 1;
	}

	let whole = Decimal::try_from_i128_with_scale(whole, 0).map_err(out_of_range)?;
	let fraction = Decimal::try_from_i128_with_scale(fraction, scale).map_err(out_of_range)?;

	whole
		.checked_add(fraction)
		.map(|d| d.normalize())
		.ok_or_else(|| WalletError::upstream_data(format!("Amount '{}' out of range", raw)))
}

/// Parses a decimal that an upstream already reports in display units.
pub fn parse_decimal(raw: &str) -> Result<Decimal> {
	raw.trim()
		.parse::<Decimal>()
		.map(|d| d.normalize())
		.map_err(|e| WalletError::upstream_data(format!("Invalid decimal '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	#[test]
	fn test_from_base_units() {
		assert_eq!(
			from_base_units("100000000", 8).unwrap(),
			Decimal::from(1)
		);
		assert_eq!(
			from_base_units("1500000000000000000", 18).unwrap(),
			Decimal::from_str("1.5").unwrap()
		);
		assert_eq!(
			from_base_units("1000", 6).unwrap(),
			Decimal::from_str("0.001").unwrap()
		);
		assert_eq!(from_base_units("0", 18).unwrap(), Decimal::ZERO);
	}

	#[test]
	fn test_large_token_amounts() {
		assert_eq!(
			from_base_units("1000000000000000000000000000000", 18).unwrap(),
			Decimal::from(1_000_000_000_000i64)
		);
		// 31 significant digits, the trailing sub-unit digits are rounded away.
		assert_eq!(
			from_base_units("1000000000000000000000000000001", 18).unwrap(),
			Decimal::from(1_000_000_000_000i64)
		);
		assert_eq!(
			from_base_units("123456789012345678901234567890123", 18).unwrap(),
			Decimal::from_str("123456789012345.6789012345679").unwrap()
		);
		assert!(from_base_units("170000000000000000000000000000000000000", 0).is_err());
	}

	#[test]
	fn test_from_hex_base_units() {
		assert_eq!(from_base_units("0x5208", 0).unwrap(), Decimal::from(21000));
		assert_eq!(from_base_units("0x", 18).unwrap(), Decimal::ZERO);
	}

	#[test]
	fn test_invalid_amounts() {
		assert!(from_base_units("12abc", 8).is_err());
		assert!(from_base_units("", 8).is_err());
		assert!(parse_decimal("1.2.3").is_err());
	}
}
