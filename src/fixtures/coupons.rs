//! Coupon Fixtures

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::Money;
use serde::Deserialize;

use crate::{
    coupons::{Coupon, CouponCode, CouponDiscount, CouponKind},
    fixtures::{FixtureError, parse_percentage, parse_price},
};

/// Wrapper for coupons in YAML
#[derive(Debug, Deserialize)]
pub struct CouponsFixture {
    /// Map of coupon code -> coupon fixture
    pub coupons: FxHashMap<String, CouponFixture>,
}

/// Coupon fixture from YAML
#[derive(Debug, Deserialize)]
pub struct CouponFixture {
    /// Discount kind
    pub kind: CouponKind,

    /// Percentage (e.g., "10%") for percentage coupons, price (e.g., "500 INR")
    /// for fixed coupons
    pub value: String,

    /// Minimum order subtotal (e.g., "5000 INR")
    pub min_order_subtotal: String,

    /// Only valid on a customer's first order
    #[serde(default)]
    pub first_order_only: bool,

    /// Only redeemable once per browser profile
    #[serde(default)]
    pub one_time_use_per_user: bool,

    /// Customer-facing description
    #[serde(default)]
    pub description: String,
}

impl CouponFixture {
    /// Convert to a [`Coupon`] with the given code.
    ///
    /// # Errors
    ///
    /// Returns an error if the value or minimum cannot be parsed, if either is
    /// negative, or if a percentage is above 100%.
    pub fn try_into_coupon(self, code: &str) -> Result<Coupon<'static>, FixtureError> {
        let discount = match self.kind {
            CouponKind::Percentage => {
                let percent = parse_percentage(&self.value)?;

                if !(Decimal::ZERO..=Decimal::ONE).contains(&(percent * Decimal::ONE)) {
                    return Err(FixtureError::InvalidPercentage(self.value));
                }

                CouponDiscount::Percentage(percent)
            }
            CouponKind::Fixed => {
                let (minor_units, currency) = parse_price(&self.value)?;

                if minor_units < 0 {
                    return Err(FixtureError::InvalidPrice(self.value));
                }

                CouponDiscount::Fixed(Money::from_minor(minor_units, currency))
            }
        };

        let (min_minor, min_currency) = parse_price(&self.min_order_subtotal)?;

        if min_minor < 0 {
            return Err(FixtureError::InvalidPrice(self.min_order_subtotal));
        }

        Ok(Coupon {
            code: CouponCode::parse(code),
            discount,
            min_order_subtotal: Money::from_minor(min_minor, min_currency),
            first_order_only: self.first_order_only,
            one_time_use_per_user: self.one_time_use_per_user,
            description: self.description,
        })
    }
}

impl CouponsFixture {
    /// Convert every entry into a [`Coupon`].
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is invalid.
    pub fn try_into_coupons(self) -> Result<Vec<Coupon<'static>>, FixtureError> {
        self.coupons
            .into_iter()
            .map(|(code, fixture)| fixture.try_into_coupon(&code))
            .collect()
    }
}
