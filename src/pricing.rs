//! Pricing
//!
//! Derives the monetary breakdown of an order from its cart lines and an
//! optional coupon. Everything here is a pure function of its inputs.
//!
//! Rounding to whole currency units happens in major units (rupees, pounds,
//! dollars) using half-up rounding, then the result is stored back in minor
//! units.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::{
    cart::CartLine,
    coupons::{Coupon, CouponDiscount},
};

/// Errors that can occur while pricing an order.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// An amount overflowed or could not be represented in minor units.
    #[error("amount overflowed or could not be represented in minor units")]
    Overflow,

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Policy values that drive tax and shipping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingPolicy<'a> {
    /// Flat tax rate applied to the subtotal.
    pub tax_rate: Percentage,

    /// Shipping is free when the subtotal is strictly above this amount.
    pub free_shipping_over: Money<'a, Currency>,

    /// Flat shipping fee charged otherwise.
    pub shipping_fee: Money<'a, Currency>,
}

impl PricingPolicy<'static> {
    /// The storefront's policy: 18% tax, free shipping above 10000, otherwise a
    /// flat 100 fee.
    pub fn storefront(currency: &'static Currency) -> Self {
        PricingPolicy {
            tax_rate: Percentage::from(Decimal::new(18, 2)),
            free_shipping_over: whole_units(10_000, currency),
            shipping_fee: whole_units(100, currency),
        }
    }
}

impl<'a> PricingPolicy<'a> {
    /// Currency the policy amounts are expressed in.
    pub fn currency(&self) -> &'a Currency {
        self.shipping_fee.currency()
    }
}

/// Monetary breakdown of an order.
///
/// `total == subtotal + tax_amount + shipping_fee - coupon_discount` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderPricing<'a> {
    /// Sum of all line totals.
    pub subtotal: Money<'a, Currency>,

    /// Tax on the subtotal, rounded to whole units.
    pub tax_amount: Money<'a, Currency>,

    /// Shipping fee, zero when shipping is free.
    pub shipping_fee: Money<'a, Currency>,

    /// Discount from the applied coupon, zero when none is applied.
    pub coupon_discount: Money<'a, Currency>,

    /// Amount payable.
    pub total: Money<'a, Currency>,
}

/// Computes order breakdowns under a [`PricingPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct PricingEngine<'a> {
    policy: PricingPolicy<'a>,
}

impl<'a> PricingEngine<'a> {
    /// Create an engine for the given policy.
    pub fn new(policy: PricingPolicy<'a>) -> Self {
        PricingEngine { policy }
    }

    /// Policy this engine prices with.
    pub fn policy(&self) -> &PricingPolicy<'a> {
        &self.policy
    }

    /// Currency every amount is produced in.
    pub fn currency(&self) -> &'a Currency {
        self.policy.currency()
    }

    /// Sum of `unit_price * quantity` over all lines. An empty cart is zero.
    ///
    /// # Errors
    ///
    /// - [`PricingError::Overflow`]: a line total overflowed.
    /// - [`PricingError::Money`]: a line is priced in another currency.
    pub fn subtotal(&self, lines: &[CartLine<'a>]) -> Result<Money<'a, Currency>, PricingError> {
        lines
            .iter()
            .try_fold(self.zero(), |acc, line| -> Result<_, PricingError> {
                let line_total = line.line_total().ok_or(PricingError::Overflow)?;

                Ok(acc.add(line_total)?)
            })
    }

    /// Tax on `subtotal`, rounded half-up to the nearest whole unit.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the amount cannot be represented.
    pub fn tax(&self, subtotal: &Money<'a, Currency>) -> Result<Money<'a, Currency>, PricingError> {
        let minor = percent_of_whole_units(self.policy.tax_rate, subtotal)?;

        Ok(Money::from_minor(minor, subtotal.currency()))
    }

    /// Shipping fee for `subtotal`.
    ///
    /// A subtotal exactly at the threshold still pays the fee.
    pub fn shipping(&self, subtotal: &Money<'a, Currency>) -> Money<'a, Currency> {
        if subtotal.to_minor_units() > self.policy.free_shipping_over.to_minor_units() {
            Money::from_minor(0, subtotal.currency())
        } else {
            self.policy.shipping_fee
        }
    }

    /// Discount granted by `coupon` on `subtotal`.
    ///
    /// Percentage coupons round half-up to whole units. Fixed coupons grant their
    /// full value, even when it exceeds the subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the amount cannot be represented.
    pub fn coupon_discount(
        &self,
        subtotal: &Money<'a, Currency>,
        coupon: Option<&Coupon<'a>>,
    ) -> Result<Money<'a, Currency>, PricingError> {
        match coupon.map(|coupon| coupon.discount) {
            None => Ok(Money::from_minor(0, subtotal.currency())),
            Some(CouponDiscount::Percentage(percent)) => {
                let minor = percent_of_whole_units(percent, subtotal)?;

                Ok(Money::from_minor(minor, subtotal.currency()))
            }
            Some(CouponDiscount::Fixed(amount)) => Ok(amount),
        }
    }

    /// Amount payable for `lines` with `coupon` applied.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if any intermediate amount fails to compute.
    pub fn total(
        &self,
        lines: &[CartLine<'a>],
        coupon: Option<&Coupon<'a>>,
    ) -> Result<Money<'a, Currency>, PricingError> {
        Ok(self.price(lines, coupon)?.total)
    }

    /// Full breakdown for `lines` with `coupon` applied.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if any intermediate amount fails to compute.
    pub fn price(
        &self,
        lines: &[CartLine<'a>],
        coupon: Option<&Coupon<'a>>,
    ) -> Result<OrderPricing<'a>, PricingError> {
        let subtotal = self.subtotal(lines)?;
        let tax_amount = self.tax(&subtotal)?;
        let shipping_fee = self.shipping(&subtotal);
        let coupon_discount = self.coupon_discount(&subtotal, coupon)?;

        let total = subtotal
            .add(tax_amount)?
            .add(shipping_fee)?
            .sub(coupon_discount)?;

        Ok(OrderPricing {
            subtotal,
            tax_amount,
            shipping_fee,
            coupon_discount,
            total,
        })
    }

    fn zero(&self) -> Money<'a, Currency> {
        Money::from_minor(0, self.currency())
    }
}

/// `amount` whole units of `currency`.
pub(crate) fn whole_units(amount: i64, currency: &Currency) -> Money<'_, Currency> {
    let minor = major_to_minor(Decimal::from(amount), currency).unwrap_or(i64::MAX);

    Money::from_minor(minor, currency)
}

/// Convert an amount in major units to minor units, rounding half-up to the
/// currency's precision.
pub(crate) fn major_to_minor(amount: Decimal, currency: &Currency) -> Option<i64> {
    let mut scaled =
        amount.round_dp_with_strategy(currency.exponent, RoundingStrategy::MidpointAwayFromZero);

    scaled.rescale(currency.exponent);

    i64::try_from(scaled.mantissa()).ok()
}

/// Convert an amount in minor units to major units.
pub(crate) fn minor_to_major(money: &Money<'_, Currency>) -> Decimal {
    Decimal::new(money.to_minor_units(), money.currency().exponent)
}

/// `percent` of `money`, rounded half-up to whole units, in minor units.
fn percent_of_whole_units(
    percent: Percentage,
    money: &Money<'_, Currency>,
) -> Result<i64, PricingError> {
    let whole = (percent * Decimal::ONE) // decimal_percentage does not expose the underlying Decimal
        .checked_mul(minor_to_major(money))
        .ok_or(PricingError::Overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let whole = whole.to_i64().ok_or(PricingError::Overflow)?;

    major_to_minor(Decimal::from(whole), money.currency()).ok_or(PricingError::Overflow)
}
