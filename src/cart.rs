//! Cart

use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::major_to_minor;

/// Errors related to cart construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A line was given a quantity below one (product id, quantity).
    #[error("product {0} has invalid quantity {1}")]
    InvalidQuantity(String, i64),

    /// A line was given a negative unit price.
    #[error("product {0} has a negative price")]
    NegativePrice(String),

    /// A unit price could not be represented in minor units.
    #[error("product {0} has a price that cannot be represented")]
    UnrepresentablePrice(String),

    /// A line's currency differs from the cart currency (product id, line currency, cart currency).
    #[error("product {0} is priced in {1}, but the cart is priced in {2}")]
    CurrencyMismatch(String, &'static str, &'static str),
}

/// One product/quantity pair in an in-progress order.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine<'a> {
    product_id: String,
    unit_price: Money<'a, Currency>,
    quantity: u32,
}

impl<'a> CartLine<'a> {
    /// Create a new cart line.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`]: `quantity` is zero.
    /// - [`CartError::NegativePrice`]: `unit_price` is below zero.
    pub fn new(
        product_id: impl Into<String>,
        unit_price: Money<'a, Currency>,
        quantity: u32,
    ) -> Result<Self, CartError> {
        let product_id = product_id.into();

        if quantity == 0 {
            return Err(CartError::InvalidQuantity(product_id, 0));
        }

        if unit_price.to_minor_units() < 0 {
            return Err(CartError::NegativePrice(product_id));
        }

        Ok(CartLine {
            product_id,
            unit_price,
            quantity,
        })
    }

    /// Identifier of the product on this line.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Price of a single unit.
    pub fn unit_price(&self) -> &Money<'a, Currency> {
        &self.unit_price
    }

    /// Number of units.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// `unit_price * quantity`, or `None` if it overflows.
    pub fn line_total(&self) -> Option<Money<'a, Currency>> {
        self.unit_price
            .to_minor_units()
            .checked_mul(i64::from(self.quantity))
            .map(|minor| Money::from_minor(minor, self.unit_price.currency()))
    }
}

/// Product as embedded in a cart record returned by the storefront API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product identifier.
    #[serde(alias = "_id")]
    pub id: String,

    /// Unit price in major units.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Display name, when the API includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Cart entry as returned by the storefront API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemRecord {
    /// The product in the cart.
    pub product: ProductRecord,

    /// Requested quantity.
    pub quantity: i64,
}

impl CartItemRecord {
    /// Convert the record into a cart line priced in `currency`.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the quantity or price is invalid.
    pub fn into_line(self, currency: &'static Currency) -> Result<CartLine<'static>, CartError> {
        let ProductRecord { id, price, .. } = self.product;

        let Ok(quantity) = u32::try_from(self.quantity) else {
            return Err(CartError::InvalidQuantity(id, self.quantity));
        };

        if price.is_sign_negative() && !price.is_zero() {
            return Err(CartError::NegativePrice(id));
        }

        let Some(minor) = major_to_minor(price, currency) else {
            return Err(CartError::UnrepresentablePrice(id));
        };

        CartLine::new(id, Money::from_minor(minor, currency), quantity)
    }
}

/// The user's in-progress order.
#[derive(Debug, Clone)]
pub struct Cart<'a> {
    lines: Vec<CartLine<'a>>,
    currency: &'static Currency,
}

impl<'a> Cart<'a> {
    /// Create an empty cart.
    pub fn new(currency: &'static Currency) -> Self {
        Cart {
            lines: Vec::new(),
            currency,
        }
    }

    /// Create a cart with the given lines.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::CurrencyMismatch`] if any line is priced in another currency.
    pub fn with_lines(
        lines: impl Into<Vec<CartLine<'a>>>,
        currency: &'static Currency,
    ) -> Result<Self, CartError> {
        let lines = lines.into();

        lines.iter().try_for_each(|line| {
            let line_currency = line.unit_price().currency();

            if line_currency == currency {
                Ok(())
            } else {
                Err(CartError::CurrencyMismatch(
                    line.product_id.clone(),
                    line_currency.iso_alpha_code,
                    currency.iso_alpha_code,
                ))
            }
        })?;

        Ok(Cart { lines, currency })
    }

    /// Lines in the cart.
    pub fn lines(&self) -> &[CartLine<'a>] {
        &self.lines
    }

    /// Get the number of lines in the cart.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Currency the cart is priced in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Iterate over the lines in the cart.
    pub fn iter(&self) -> std::slice::Iter<'_, CartLine<'a>> {
        self.lines.iter()
    }
}

impl Cart<'static> {
    /// Build a cart from the storefront API's cart read.
    ///
    /// A missing list is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if any record has an invalid quantity or price.
    pub fn from_records(
        records: Option<Vec<CartItemRecord>>,
        currency: &'static Currency,
    ) -> Result<Self, CartError> {
        let lines = records
            .unwrap_or_default()
            .into_iter()
            .map(|record| record.into_line(currency))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Cart { lines, currency })
    }
}

impl<'c, 'a> IntoIterator for &'c Cart<'a> {
    type Item = &'c CartLine<'a>;
    type IntoIter = std::slice::Iter<'c, CartLine<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}
