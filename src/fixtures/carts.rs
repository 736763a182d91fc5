//! Cart Fixtures

use std::{fs, path::Path};

use rusty_money::{Money, iso::Currency};
use serde::Deserialize;

use crate::{
    cart::{Cart, CartLine},
    fixtures::{FixtureError, parse_price},
};

/// Wrapper for a cart in YAML
#[derive(Debug, Deserialize)]
pub struct CartFixture {
    /// Lines in the cart
    pub items: Vec<CartLineFixture>,
}

/// Cart line fixture
#[derive(Debug, Deserialize)]
pub struct CartLineFixture {
    /// Product identifier
    pub product: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Unit price (e.g., "2499.99 INR")
    pub price: String,

    /// Number of units
    pub quantity: u32,
}

impl CartFixture {
    /// Load a cart fixture from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Ok(serde_norway::from_str(&contents)?)
    }

    /// Build a cart. Every line must share one currency; an empty fixture uses
    /// `fallback_currency`.
    ///
    /// # Errors
    ///
    /// Returns an error if a price cannot be parsed, currencies differ between
    /// lines, or a line is invalid.
    pub fn into_cart(
        self,
        fallback_currency: &'static Currency,
    ) -> Result<Cart<'static>, FixtureError> {
        let mut currency: Option<&'static Currency> = None;
        let mut lines = Vec::with_capacity(self.items.len());

        for item in self.items {
            let (minor_units, line_currency) = parse_price(&item.price)?;

            if let Some(existing_currency) = currency {
                if existing_currency != line_currency {
                    return Err(FixtureError::CurrencyMismatch(
                        existing_currency.iso_alpha_code.to_string(),
                        line_currency.iso_alpha_code.to_string(),
                    ));
                }
            } else {
                currency = Some(line_currency);
            }

            lines.push(CartLine::new(
                item.product,
                Money::from_minor(minor_units, line_currency),
                item.quantity,
            )?);
        }

        Ok(Cart::with_lines(lines, currency.unwrap_or(fallback_currency))?)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::INR;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn cart_fixture_builds_cart() -> TestResult {
        let fixture: CartFixture = serde_norway::from_str(
            r#"
items:
  - product: standing-desk
    name: Standing Desk
    price: "2500 INR"
    quantity: 3
"#,
        )?;

        let cart = fixture.into_cart(INR)?;

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.currency(), INR);

        Ok(())
    }

    #[test]
    fn empty_fixture_uses_fallback_currency() -> TestResult {
        let fixture: CartFixture = serde_norway::from_str("items: []")?;

        let cart = fixture.into_cart(INR)?;

        assert!(cart.is_empty());

        Ok(())
    }

    #[test]
    fn mixed_currencies_are_rejected() -> TestResult {
        let fixture: CartFixture = serde_norway::from_str(
            r#"
items:
  - { product: a, price: "10 INR", quantity: 1 }
  - { product: b, price: "10 USD", quantity: 1 }
"#,
        )?;

        assert!(matches!(
            fixture.into_cart(INR),
            Err(FixtureError::CurrencyMismatch(expected, found)) if expected == "INR" && found == "USD"
        ));

        Ok(())
    }

    #[test]
    fn zero_quantity_is_rejected() -> TestResult {
        let fixture: CartFixture = serde_norway::from_str(
            r#"
items:
  - { product: a, price: "10 INR", quantity: 0 }
"#,
        )?;

        assert!(matches!(fixture.into_cart(INR), Err(FixtureError::Cart(_))));

        Ok(())
    }
}
