//! Order summary
//!
//! Renders a priced cart as a table of lines followed by the breakdown the
//! customer is about to pay.

use std::io;

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{cart::Cart, coupons::CouponCode, pricing::OrderPricing};

/// Errors that can occur when writing a summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// A line total overflowed (product id).
    #[error("line total for {0} overflowed")]
    Overflow(String),

    /// The summary could not be written.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A priced cart ready to show to the customer.
#[derive(Debug, Clone)]
pub struct OrderSummary<'c, 'a> {
    cart: &'c Cart<'a>,
    pricing: OrderPricing<'a>,
    coupon: Option<CouponCode>,
}

impl<'c, 'a> OrderSummary<'c, 'a> {
    /// Summarise `cart`, priced as `pricing` with `coupon` applied.
    pub fn new(cart: &'c Cart<'a>, pricing: OrderPricing<'a>, coupon: Option<CouponCode>) -> Self {
        OrderSummary {
            cart,
            pricing,
            coupon,
        }
    }

    /// The breakdown being summarised.
    pub fn pricing(&self) -> &OrderPricing<'a> {
        &self.pricing
    }

    /// Write the summary. `names` maps product ids to display names; ids
    /// without a name are shown as-is.
    ///
    /// # Errors
    ///
    /// Returns a [`SummaryError`] if a line total overflows or writing fails.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        names: &FxHashMap<String, String>,
    ) -> Result<(), SummaryError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Unit Price", "Qty", "Line Total"]);

        for (idx, line) in self.cart.iter().enumerate() {
            let line_total = line
                .line_total()
                .ok_or_else(|| SummaryError::Overflow(line.product_id().to_string()))?;

            let name = names
                .get(line.product_id())
                .map_or(line.product_id(), String::as_str);

            builder.push_record([
                format!("#{}", idx + 1),
                name.to_string(),
                line.unit_price().to_string(),
                line.quantity().to_string(),
                line_total.to_string(),
            ]);
        }

        write_lines_table(&mut out, builder)?;
        self.write_breakdown(&mut out)?;

        Ok(())
    }

    /// Labels and amounts right-aligned in a borderless table, total in bold.
    fn write_breakdown(&self, out: &mut impl io::Write) -> Result<(), SummaryError> {
        let pricing = &self.pricing;
        let mut builder = Builder::default();

        builder.push_record(["Subtotal:".to_string(), pricing.subtotal.to_string()]);
        builder.push_record(["Tax:".to_string(), pricing.tax_amount.to_string()]);

        let shipping = if pricing.shipping_fee.to_minor_units() == 0 {
            "Free".to_string()
        } else {
            pricing.shipping_fee.to_string()
        };

        builder.push_record(["Shipping:".to_string(), shipping]);

        if let Some(code) = &self.coupon {
            builder.push_record([
                format!("Coupon ({code}):"),
                format!("-{}", pricing.coupon_discount),
            ]);
        }

        builder.push_record(["Total:".to_string(), pricing.total.to_string()]);

        let mut table = builder.build();

        table.with(Style::blank());
        table.modify(Columns::new(0..2), Alignment::right());
        table.modify(Rows::last(), Color::BOLD);

        writeln!(out, "{table}\n")?;

        Ok(())
    }
}

/// Amount owed, formatted for a one-line message.
pub fn format_total(total: &Money<'_, Currency>) -> String {
    if total.to_minor_units() < 0 {
        format!("{total} (credit)")
    } else {
        total.to_string()
    }
}

fn write_lines_table(out: &mut impl io::Write, builder: Builder) -> Result<(), SummaryError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..5), Alignment::right());

    writeln!(out, "\n{table}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::INR;
    use testresult::TestResult;

    use crate::{
        cart::CartLine,
        coupons::{Coupon, CouponDiscount},
        pricing::{PricingEngine, PricingPolicy, whole_units},
    };

    use super::*;

    fn strip_ansi(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut in_escape = false;

        for ch in s.chars() {
            if in_escape {
                in_escape = !ch.is_ascii_alphabetic();
            } else if ch == '\x1b' {
                in_escape = true;
            } else {
                out.push(ch);
            }
        }

        out
    }

    #[test]
    fn write_to_renders_lines_and_breakdown() -> TestResult {
        let cart = Cart::with_lines(
            vec![
                CartLine::new("desk", whole_units(2500, INR), 2)?,
                CartLine::new("lamp", whole_units(2500, INR), 1)?,
            ],
            INR,
        )?;

        let coupon = Coupon::new(
            CouponCode::parse("SAVE500"),
            CouponDiscount::Fixed(whole_units(500, INR)),
            whole_units(7000, INR),
        );

        let pricing =
            PricingEngine::new(PricingPolicy::storefront(INR)).price(cart.lines(), Some(&coupon))?;

        let names = FxHashMap::from_iter([("desk".to_string(), "Standing Desk".to_string())]);

        let mut out = Vec::new();
        OrderSummary::new(&cart, pricing, Some(coupon.code.clone())).write_to(&mut out, &names)?;

        let output = strip_ansi(&String::from_utf8(out)?);

        assert!(output.contains("Standing Desk"));
        assert!(output.contains("lamp"));
        assert!(output.contains("Subtotal:"));
        assert!(output.contains("Coupon (SAVE500):"));
        assert!(output.contains(&format!("-{}", whole_units(500, INR))));
        assert!(output.contains(&whole_units(8450, INR).to_string()));

        let total_line = output
            .lines()
            .find(|line| line.contains("Total:"))
            .ok_or("missing total line")?;

        assert!(total_line.trim_end().ends_with(&whole_units(8450, INR).to_string()));

        Ok(())
    }

    #[test]
    fn free_shipping_is_labelled() -> TestResult {
        let cart = Cart::with_lines(vec![CartLine::new("rack", whole_units(12_000, INR), 1)?], INR)?;
        let pricing = PricingEngine::new(PricingPolicy::storefront(INR)).price(cart.lines(), None)?;

        let mut out = Vec::new();
        OrderSummary::new(&cart, pricing, None).write_to(&mut out, &FxHashMap::default())?;

        let output = strip_ansi(&String::from_utf8(out)?);

        assert!(output.contains("Free"));
        assert!(!output.contains("Coupon"));

        Ok(())
    }

    #[test]
    fn negative_totals_are_marked_as_credit() {
        assert!(format_total(&whole_units(-282, INR)).ends_with("(credit)"));
        assert!(!format_total(&whole_units(282, INR)).ends_with("(credit)"));
    }
}
