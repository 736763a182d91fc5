//! Orders
//!
//! Shipping details collected at checkout, the payload submitted to the order
//! endpoint and the slice of order history the coupon rules need.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::Cart,
    coupons::CouponCode,
    pricing::{OrderPricing, minor_to_major},
};

/// Number of digits in a phone number.
const PHONE_DIGITS: usize = 10;

/// Number of digits in a postal code.
const POSTAL_CODE_DIGITS: usize = 6;

/// Problems with a shipping address, shown next to the offending field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is blank (field name).
    #[error("Please enter your {0}")]
    Missing(&'static str),

    /// The phone number is not ten digits.
    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhone,

    /// The postal code is not six digits.
    #[error("Please enter a valid 6-digit postal code")]
    InvalidPostalCode,
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Recipient name.
    pub full_name: String,

    /// Contact number.
    pub phone: String,

    /// First address line.
    pub line1: String,

    /// Optional second address line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,

    /// City.
    pub city: String,

    /// State or region.
    pub state: String,

    /// Postal code.
    pub postal_code: String,
}

impl ShippingAddress {
    /// Check the address, reporting the first problem found.
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] if a required field is blank or the phone
    /// number or postal code is malformed.
    pub fn validate(&self) -> Result<(), AddressError> {
        let required = [
            ("full name", &self.full_name),
            ("phone number", &self.phone),
            ("address", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal code", &self.postal_code),
        ];

        if let Some((field, _)) = required.into_iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AddressError::Missing(field));
        }

        if !is_digits(&self.phone, PHONE_DIGITS) {
            return Err(AddressError::InvalidPhone);
        }

        if !is_digits(&self.postal_code, POSTAL_CODE_DIGITS) {
            return Err(AddressError::InvalidPostalCode);
        }

        Ok(())
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    let value = value.trim();

    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Through the external payment gateway.
    #[serde(rename = "online")]
    Online,

    /// On delivery. Needs no gateway confirmation.
    #[serde(rename = "cod")]
    CashOnDelivery,
}

/// One product/quantity pair in a submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product identifier.
    pub product: String,

    /// Number of units.
    pub quantity: u32,
}

/// Body of the order-creation request. Amounts are major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// Ordered products.
    pub items: Vec<OrderItem>,

    /// Delivery address.
    pub shipping_address: ShippingAddress,

    /// Payment method.
    pub payment_method: PaymentMethod,

    /// Applied coupon, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<CouponCode>,

    /// Discount from the applied coupon.
    #[serde(with = "rust_decimal::serde::float")]
    pub coupon_discount: Decimal,

    /// Sum of line totals.
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,

    /// Tax charged.
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,

    /// Shipping charged.
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_fee: Decimal,

    /// Amount payable.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,

    /// Gateway payment reference for online payments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

impl OrderPayload {
    /// Build the payload for `cart` priced as `pricing`.
    pub fn new(
        cart: &Cart<'_>,
        pricing: &OrderPricing<'_>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        coupon_code: Option<CouponCode>,
        payment_id: Option<String>,
    ) -> Self {
        let items = cart
            .iter()
            .map(|line| OrderItem {
                product: line.product_id().to_string(),
                quantity: line.quantity(),
            })
            .collect();

        OrderPayload {
            items,
            shipping_address,
            payment_method,
            coupon_code,
            coupon_discount: minor_to_major(&pricing.coupon_discount),
            subtotal: minor_to_major(&pricing.subtotal),
            tax_amount: minor_to_major(&pricing.tax_amount),
            shipping_fee: minor_to_major(&pricing.shipping_fee),
            total: minor_to_major(&pricing.total),
            payment_id,
        }
    }
}

/// A past order as listed by the order-history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Order identifier.
    #[serde(alias = "_id")]
    pub id: String,

    /// Fulfilment status.
    #[serde(default)]
    pub status: String,
}

/// A customer with no previous orders is on their first order.
pub fn is_first_order(history: &[OrderRecord]) -> bool {
    history.is_empty()
}
