//! Coupon eligibility
//!
//! Checks run in a fixed order and the first failing check decides the
//! rejection, since each reason carries a different message:
//!
//! 1. the code must exist,
//! 2. a one-time coupon must not already be redeemed,
//! 3. a first-order coupon needs a first order,
//! 4. the subtotal must reach the coupon's minimum.

use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    coupons::{Coupon, CouponCode, CouponTable},
    pricing::{PricingEngine, PricingError},
};

/// Why a coupon cannot be applied. These are expected outcomes, not failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    /// No rule matches the code.
    #[error("Invalid coupon code")]
    NotFound,

    /// The coupon is one-time and this profile already redeemed it.
    #[error("You have already used this coupon")]
    AlreadyUsed,

    /// The coupon is for first orders and the customer has ordered before.
    #[error("This coupon is only valid on your first order")]
    FirstOrderOnly,

    /// The subtotal is below the coupon's minimum (formatted minimum).
    #[error("Add items worth at least {minimum} to use this coupon")]
    BelowMinimum {
        /// Minimum order subtotal, formatted for display.
        minimum: String,
    },
}

/// Errors from [`CouponPolicy::apply`].
#[derive(Debug, Error, PartialEq)]
pub enum ApplyError {
    /// The coupon does not apply to this cart.
    #[error(transparent)]
    Rejected(#[from] CouponRejection),

    /// The discount could not be computed.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// A coupon accepted for a cart, with the discount it grants.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoupon<'a> {
    /// Canonical code.
    pub code: CouponCode,

    /// Discount on the subtotal it was validated against.
    pub discount: Money<'a, Currency>,

    /// Customer-facing description.
    pub description: String,
}

/// Cart and customer state a coupon is validated against.
#[derive(Debug, Clone, Copy)]
pub struct CouponContext<'c, 'a> {
    /// Current cart subtotal.
    pub subtotal: Money<'a, Currency>,

    /// The customer has no previous orders.
    pub is_first_order: bool,

    /// Codes this browser profile already redeemed.
    pub already_used: &'c FxHashSet<CouponCode>,
}

/// Decides whether submitted codes may apply to a cart.
#[derive(Debug, Clone)]
pub struct CouponPolicy<'a> {
    table: CouponTable<'a>,
}

impl<'a> CouponPolicy<'a> {
    /// Create a policy over the given rules.
    pub fn new(table: CouponTable<'a>) -> Self {
        CouponPolicy { table }
    }

    /// Rules this policy checks against.
    pub fn table(&self) -> &CouponTable<'a> {
        &self.table
    }

    /// Find the rule for user input, canonicalising it first.
    pub fn lookup(&self, code: &str) -> Option<&Coupon<'a>> {
        self.table.get(&CouponCode::parse(code))
    }

    /// Validate user input against `context`.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn validate(
        &self,
        code: &str,
        context: &CouponContext<'_, 'a>,
    ) -> Result<&Coupon<'a>, CouponRejection> {
        let coupon = self.lookup(code).ok_or(CouponRejection::NotFound)?;

        check_eligibility(coupon, context)?;

        Ok(coupon)
    }

    /// Validate user input and compute the discount it grants on the context's
    /// subtotal.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::Rejected`]: the coupon does not apply.
    /// - [`ApplyError::Pricing`]: the discount cannot be represented.
    pub fn apply(
        &self,
        code: &str,
        context: &CouponContext<'_, 'a>,
        engine: &PricingEngine<'a>,
    ) -> Result<AppliedCoupon<'a>, ApplyError> {
        let coupon = self.validate(code, context)?;
        let discount = engine.coupon_discount(&context.subtotal, Some(coupon))?;

        Ok(AppliedCoupon {
            code: coupon.code.clone(),
            discount,
            description: coupon.description.clone(),
        })
    }
}

/// Run the eligibility checks after the code has been found.
///
/// # Errors
///
/// Returns the first [`CouponRejection`] that applies.
pub fn check_eligibility(
    coupon: &Coupon<'_>,
    context: &CouponContext<'_, '_>,
) -> Result<(), CouponRejection> {
    if coupon.one_time_use_per_user && context.already_used.contains(&coupon.code) {
        return Err(CouponRejection::AlreadyUsed);
    }

    if coupon.first_order_only && !context.is_first_order {
        return Err(CouponRejection::FirstOrderOnly);
    }

    if context.subtotal.to_minor_units() < coupon.min_order_subtotal.to_minor_units() {
        return Err(CouponRejection::BelowMinimum {
            minimum: coupon.min_order_subtotal.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::INR;
    use testresult::TestResult;

    use decimal_percentage::Percentage;

    use crate::{
        coupons::CouponDiscount,
        pricing::{PricingPolicy, whole_units},
    };

    use super::*;

    fn policy() -> Result<CouponPolicy<'static>, crate::coupons::CouponTableError> {
        let table = CouponTable::new([
            Coupon::new(
                CouponCode::parse("FIRST10"),
                CouponDiscount::Percentage(Percentage::from(Decimal::new(10, 2))),
                whole_units(0, INR),
            )
            .first_order_only()
            .one_time_use(),
            Coupon::new(
                CouponCode::parse("SAVE500"),
                CouponDiscount::Fixed(whole_units(500, INR)),
                whole_units(7000, INR),
            )
            .one_time_use(),
            Coupon::new(
                CouponCode::parse("EVERYDAY"),
                CouponDiscount::Fixed(whole_units(50, INR)),
                whole_units(0, INR),
            ),
        ])?;

        Ok(CouponPolicy::new(table))
    }

    fn context(
        subtotal: i64,
        is_first_order: bool,
        already_used: &FxHashSet<CouponCode>,
    ) -> CouponContext<'_, 'static> {
        CouponContext {
            subtotal: whole_units(subtotal, INR),
            is_first_order,
            already_used,
        }
    }

    #[test]
    fn lookup_canonicalises_input() -> TestResult {
        let policy = policy()?;

        assert!(policy.lookup(" save500 ").is_some());
        assert!(policy.lookup("SAVE-500").is_none());

        Ok(())
    }

    #[test]
    fn unknown_code_is_not_found() -> TestResult {
        let used = FxHashSet::default();

        assert_eq!(
            policy()?.validate("ZZZZ", &context(50_000, true, &used)),
            Err(CouponRejection::NotFound)
        );

        Ok(())
    }

    #[test]
    fn already_used_wins_over_first_order_and_minimum() -> TestResult {
        let used = FxHashSet::from_iter([CouponCode::parse("FIRST10")]);

        assert_eq!(
            policy()?.validate("first10", &context(0, false, &used)),
            Err(CouponRejection::AlreadyUsed)
        );

        Ok(())
    }

    #[test]
    fn first_order_wins_over_minimum() -> TestResult {
        let used = FxHashSet::default();
        let table = CouponTable::new([Coupon::new(
            CouponCode::parse("BIGFIRST"),
            CouponDiscount::Fixed(whole_units(100, INR)),
            whole_units(9000, INR),
        )
        .first_order_only()])?;

        assert_eq!(
            CouponPolicy::new(table).validate("BIGFIRST", &context(10, false, &used)),
            Err(CouponRejection::FirstOrderOnly)
        );

        Ok(())
    }

    #[test]
    fn below_minimum_reports_the_minimum() -> TestResult {
        let used = FxHashSet::default();
        let policy = policy()?;
        let result = policy.validate("SAVE500", &context(6999, true, &used));

        let Err(CouponRejection::BelowMinimum { minimum }) = result else {
            return Err(format!("expected BelowMinimum, got {result:?}").into());
        };

        assert_eq!(minimum, whole_units(7000, INR).to_string());

        Ok(())
    }

    #[test]
    fn minimum_is_inclusive() -> TestResult {
        let used = FxHashSet::default();
        let policy = policy()?;

        let coupon = policy.validate("SAVE500", &context(7000, false, &used))?;

        assert_eq!(coupon.code.as_str(), "SAVE500");

        Ok(())
    }

    #[test]
    fn reusable_coupons_ignore_the_used_set() -> TestResult {
        let used = FxHashSet::from_iter([CouponCode::parse("EVERYDAY")]);

        assert!(policy()?.validate("EVERYDAY", &context(10, false, &used)).is_ok());

        Ok(())
    }

    #[test]
    fn apply_computes_the_discount_on_the_subtotal() -> TestResult {
        let used = FxHashSet::default();
        let engine = PricingEngine::new(PricingPolicy::storefront(INR));

        let applied = policy()?.apply("first10", &context(2450, true, &used), &engine)?;

        assert_eq!(applied.code.as_str(), "FIRST10");
        assert_eq!(applied.discount, whole_units(245, INR));

        assert_eq!(
            policy()?.apply("FIRST10", &context(2450, false, &used), &engine),
            Err(ApplyError::Rejected(CouponRejection::FirstOrderOnly))
        );

        Ok(())
    }

    #[test]
    fn rejections_have_specific_messages() {
        assert_eq!(CouponRejection::NotFound.to_string(), "Invalid coupon code");
        assert_eq!(
            CouponRejection::AlreadyUsed.to_string(),
            "You have already used this coupon"
        );
        assert_eq!(
            CouponRejection::FirstOrderOnly.to_string(),
            "This coupon is only valid on your first order"
        );
        assert_eq!(
            CouponRejection::BelowMinimum {
                minimum: "₹5,000.00".to_string()
            }
            .to_string(),
            "Add items worth at least ₹5,000.00 to use this coupon"
        );
    }
}
