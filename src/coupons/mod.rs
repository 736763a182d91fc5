//! Coupons
//!
//! A coupon is a static discount rule with eligibility constraints. Rules are
//! data: a [`CouponTable`] is built from a list of [`Coupon`]s (or loaded from a
//! YAML fixture) and handed to a [`policy::CouponPolicy`] at construction.

use std::fmt;

use decimal_percentage::Percentage;
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixtures::{FixtureError, coupons::CouponsFixture};

pub mod policy;
pub mod redemptions;

/// The storefront's production coupon rules.
const STOREFRONT_COUPONS: &str = include_str!("../../fixtures/coupons.yml");

/// Canonical (trimmed, upper-case) coupon code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Canonicalise user input into a code.
    pub fn parse(raw: &str) -> Self {
        CouponCode(raw.trim().to_uppercase())
    }

    /// The canonical code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CouponCode {
    fn from(raw: String) -> Self {
        CouponCode::parse(&raw)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of discount a coupon grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// A percentage of the order subtotal.
    Percentage,

    /// A fixed amount off the order.
    Fixed,
}

/// Discount granted by a coupon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CouponDiscount<'a> {
    /// Percentage of the subtotal (e.g., "10% off")
    Percentage(Percentage),

    /// Fixed amount off the order total (e.g., "₹500 off")
    Fixed(Money<'a, Currency>),
}

impl CouponDiscount<'_> {
    /// Kind of this discount.
    pub fn kind(&self) -> CouponKind {
        match self {
            CouponDiscount::Percentage(_) => CouponKind::Percentage,
            CouponDiscount::Fixed(_) => CouponKind::Fixed,
        }
    }
}

/// A named discount rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon<'a> {
    /// Canonical code customers enter.
    pub code: CouponCode,

    /// Discount granted when the coupon applies.
    pub discount: CouponDiscount<'a>,

    /// Smallest subtotal the coupon applies to.
    pub min_order_subtotal: Money<'a, Currency>,

    /// Only valid when the customer has no previous orders.
    pub first_order_only: bool,

    /// Can be redeemed once per browser profile.
    pub one_time_use_per_user: bool,

    /// Customer-facing description.
    pub description: String,
}

impl<'a> Coupon<'a> {
    /// Create a coupon with no first-order or one-time restrictions.
    pub fn new(
        code: CouponCode,
        discount: CouponDiscount<'a>,
        min_order_subtotal: Money<'a, Currency>,
    ) -> Self {
        Coupon {
            code,
            discount,
            min_order_subtotal,
            first_order_only: false,
            one_time_use_per_user: false,
            description: String::new(),
        }
    }

    /// Restrict the coupon to first orders.
    #[must_use]
    pub fn first_order_only(mut self) -> Self {
        self.first_order_only = true;
        self
    }

    /// Allow a single redemption per browser profile.
    #[must_use]
    pub fn one_time_use(mut self) -> Self {
        self.one_time_use_per_user = true;
        self
    }

    /// Set the customer-facing description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Errors building a coupon table.
#[derive(Debug, Error)]
pub enum CouponTableError {
    /// Two rules share a code once canonicalised.
    #[error("duplicate coupon code: {0}")]
    DuplicateCode(CouponCode),

    /// A rule's amounts use a different currency from the rest of the table
    /// (code, rule currency, table currency).
    #[error("coupon {0} is priced in {1}, but the table is priced in {2}")]
    CurrencyMismatch(CouponCode, &'static str, &'static str),

    /// The fixture could not be read or parsed.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

/// Fixed table of coupon rules keyed by canonical code.
#[derive(Debug, Clone, Default)]
pub struct CouponTable<'a> {
    coupons: FxHashMap<CouponCode, Coupon<'a>>,
}

impl<'a> CouponTable<'a> {
    /// Build a table from a list of rules.
    ///
    /// # Errors
    ///
    /// - [`CouponTableError::DuplicateCode`]: two rules share a code.
    /// - [`CouponTableError::CurrencyMismatch`]: rules are priced in different currencies.
    pub fn new(coupons: impl IntoIterator<Item = Coupon<'a>>) -> Result<Self, CouponTableError> {
        let mut table = FxHashMap::default();
        let mut currency: Option<&Currency> = None;

        for mut coupon in coupons {
            coupon.code = CouponCode::parse(coupon.code.as_str());

            let coupon_currency = coupon.min_order_subtotal.currency();
            let amounts = [Some(coupon.min_order_subtotal), fixed_amount(&coupon.discount)];

            for amount in amounts.into_iter().flatten() {
                let expected = *currency.get_or_insert(coupon_currency);

                if amount.currency() != expected {
                    return Err(CouponTableError::CurrencyMismatch(
                        coupon.code,
                        amount.currency().iso_alpha_code,
                        expected.iso_alpha_code,
                    ));
                }
            }

            if table.contains_key(&coupon.code) {
                return Err(CouponTableError::DuplicateCode(coupon.code));
            }

            table.insert(coupon.code.clone(), coupon);
        }

        Ok(CouponTable { coupons: table })
    }

    /// Find the rule for an already-canonical code.
    pub fn get(&self, code: &CouponCode) -> Option<&Coupon<'a>> {
        self.coupons.get(code)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    /// Check if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }

    /// Iterate over the rules in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Coupon<'a>> {
        self.coupons.values()
    }
}

impl CouponTable<'static> {
    /// The storefront's production rules.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponTableError`] if the embedded rules are invalid.
    pub fn storefront() -> Result<Self, CouponTableError> {
        Self::from_yaml(STOREFRONT_COUPONS)
    }

    /// Parse rules from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponTableError`] if the document cannot be parsed or the rules
    /// are invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self, CouponTableError> {
        let fixture: CouponsFixture =
            serde_norway::from_str(yaml).map_err(FixtureError::from)?;

        Self::new(fixture.try_into_coupons()?)
    }

    /// Load rules from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponTableError`] if the file cannot be read or parsed, or the
    /// rules are invalid.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, CouponTableError> {
        let contents = std::fs::read_to_string(path).map_err(FixtureError::from)?;

        Self::from_yaml(&contents)
    }
}

fn fixed_amount<'a>(discount: &CouponDiscount<'a>) -> Option<Money<'a, Currency>> {
    match discount {
        CouponDiscount::Fixed(amount) => Some(*amount),
        CouponDiscount::Percentage(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::{INR, USD};
    use testresult::TestResult;

    use crate::pricing::whole_units;

    use super::*;

    #[test]
    fn codes_are_trimmed_and_upper_cased() {
        assert_eq!(CouponCode::parse("  save500 ").as_str(), "SAVE500");
    }

    #[test]
    fn codes_deserialize_canonically() -> TestResult {
        let code: CouponCode = serde_json::from_str(r#"" first10""#)?;

        assert_eq!(code, CouponCode::parse("FIRST10"));

        Ok(())
    }

    #[test]
    fn table_canonicalises_rule_codes() -> TestResult {
        let coupon = Coupon::new(
            CouponCode("welcome20".to_string()),
            CouponDiscount::Percentage(Percentage::from(Decimal::new(20, 2))),
            whole_units(5000, INR),
        );

        let table = CouponTable::new([coupon])?;

        assert!(table.get(&CouponCode::parse("WELCOME20")).is_some());

        Ok(())
    }

    #[test]
    fn table_rejects_duplicate_codes() {
        let first = Coupon::new(
            CouponCode::parse("SAVE500"),
            CouponDiscount::Fixed(whole_units(500, INR)),
            whole_units(7000, INR),
        );

        let second = Coupon {
            code: CouponCode("save500 ".to_string()),
            ..first.clone()
        };

        assert!(matches!(
            CouponTable::new([first, second]),
            Err(CouponTableError::DuplicateCode(code)) if code.as_str() == "SAVE500"
        ));
    }

    #[test]
    fn table_rejects_mixed_currencies() {
        let inr = Coupon::new(
            CouponCode::parse("SAVE500"),
            CouponDiscount::Fixed(whole_units(500, INR)),
            whole_units(7000, INR),
        );

        let usd = Coupon::new(
            CouponCode::parse("SAVE5"),
            CouponDiscount::Fixed(whole_units(5, USD)),
            whole_units(70, USD),
        );

        assert!(matches!(
            CouponTable::new([inr, usd]),
            Err(CouponTableError::CurrencyMismatch(_, "USD", "INR"))
        ));
    }

    #[test]
    fn storefront_table_has_the_published_coupons() -> TestResult {
        let table = CouponTable::storefront()?;

        let first10 = table.get(&CouponCode::parse("FIRST10")).ok_or("FIRST10")?;
        let welcome20 = table.get(&CouponCode::parse("WELCOME20")).ok_or("WELCOME20")?;
        let save500 = table.get(&CouponCode::parse("SAVE500")).ok_or("SAVE500")?;

        assert_eq!(table.len(), 3);

        assert_eq!(first10.discount.kind(), CouponKind::Percentage);
        assert!(first10.first_order_only);

        assert_eq!(welcome20.min_order_subtotal, whole_units(5000, INR));
        assert!(!welcome20.first_order_only);

        assert_eq!(save500.discount, CouponDiscount::Fixed(whole_units(500, INR)));
        assert_eq!(save500.min_order_subtotal, whole_units(7000, INR));
        assert!(save500.one_time_use_per_user);

        Ok(())
    }
}
