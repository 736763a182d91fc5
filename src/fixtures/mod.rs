//! Fixtures
//!
//! YAML documents describing coupon rules and carts. Amounts are written as
//! `"AMOUNT CURRENCY"` strings (e.g., `"499.50 INR"`) and percentages as either
//! `"10%"` or `"0.10"`.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Findable, iso::Currency};
use thiserror::Error;

use crate::{cart::CartError, pricing::major_to_minor};

pub mod carts;
pub mod coupons;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Currency mismatch between entries
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// Cart construction error
    #[error("Failed to create cart: {0}")]
    Cart(#[from] CartError),
}

/// Parse price string (e.g., "2.99 INR") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed as a decimal, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(currency_code), None) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = Currency::find(currency_code)
        .ok_or_else(|| FixtureError::UnknownCurrency(currency_code.to_string()))?;

    let minor_units =
        major_to_minor(amount, currency).ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Parse percentage string (e.g., "15%" or "0.15") into a `Percentage`
///
/// # Errors
///
/// Returns an error if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Percentage, FixtureError> {
    let trimmed = s.trim();

    let (value, divisor) = match trimmed.strip_suffix('%') {
        Some(percent_str) => (percent_str.trim(), Decimal::ONE_HUNDRED),
        None => (trimmed, Decimal::ONE),
    };

    let value = value
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))?;

    value
        .checked_div(divisor)
        .map(Percentage::from)
        .ok_or_else(|| FixtureError::InvalidPercentage(s.to_string()))
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{INR, USD};

    use super::*;

    #[test]
    fn parse_price_reads_amount_and_currency() -> Result<(), FixtureError> {
        let (minor, currency) = parse_price("499.50 INR")?;

        assert_eq!(minor, 49_950);
        assert_eq!(currency, INR);

        Ok(())
    }

    #[test]
    fn parse_price_accepts_other_iso_currencies() -> Result<(), FixtureError> {
        let (minor, currency) = parse_price("1.00 USD")?;

        assert_eq!(minor, 100);
        assert_eq!(currency, USD);

        Ok(())
    }

    #[test]
    fn parse_price_rejects_invalid_format() {
        assert!(matches!(parse_price("2.99INR"), Err(FixtureError::InvalidPrice(_))));
        assert!(matches!(parse_price("2.99 INR extra"), Err(FixtureError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC");

        assert!(matches!(result, Err(FixtureError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn parse_percentage_accepts_percentage_format() -> Result<(), FixtureError> {
        assert_eq!(parse_percentage("  10%  ")?, Percentage::from(Decimal::new(10, 2)));

        Ok(())
    }

    #[test]
    fn parse_percentage_accepts_decimal_format() -> Result<(), FixtureError> {
        assert_eq!(parse_percentage("0.2")?, Percentage::from(Decimal::new(2, 1)));

        Ok(())
    }

    #[test]
    fn parse_percentage_rejects_invalid_format() {
        assert!(matches!(
            parse_percentage("ten percent"),
            Err(FixtureError::InvalidPercentage(_))
        ));
    }
}
