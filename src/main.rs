//! Atlas & Arrow quote
//!
//! Prices a cart fixture the way checkout would: storefront tax and shipping,
//! plus an optional coupon checked against the coupon rules and the profile's
//! redeemed coupons.

use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use atlas_storefront::{
    cart::Cart,
    coupons::{
        Coupon, CouponTable, CouponTableError,
        policy::{CouponContext, CouponPolicy},
        redemptions::UsedCoupons,
    },
    fixtures::{FixtureError, carts::CartFixture},
    pricing::{PricingEngine, PricingError, PricingPolicy},
    storage::{FileStore, MemoryStore, SessionStore, StoreError},
    summary::{OrderSummary, SummaryError, format_total},
};
use rustc_hash::FxHashMap;
use rusty_money::{Findable, iso::Currency};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::QuoteConfig;

mod config;
mod logging;

/// Errors that stop a quote.
#[derive(Debug, Error)]
enum QuoteError {
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("failed to load cart: {0}")]
    Cart(#[from] FixtureError),

    #[error("failed to load coupons: {0}")]
    Coupons(#[from] CouponTableError),

    #[error("failed to open profile store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to price cart: {0}")]
    Pricing(#[from] PricingError),

    #[error("failed to write summary: {0}")]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Atlas & Arrow quote entry point
pub fn main() {
    let config = QuoteConfig::load().unwrap_or_else(|e| e.exit());

    if let Err(e) = logging::init_subscriber(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized, must use eprintln for subscriber errors"
        )]
        {
            eprintln!("Logging error: {e}");
        }

        process::exit(1);
    }

    if let Err(e) = run(&config) {
        error!(error = %e, "quote failed");

        #[expect(clippy::print_stderr, reason = "final user-facing error message")]
        {
            eprintln!("{e}");
        }

        process::exit(1);
    }
}

fn run(config: &QuoteConfig) -> Result<(), QuoteError> {
    let currency = Currency::find(&config.currency)
        .ok_or_else(|| QuoteError::UnknownCurrency(config.currency.clone()))?;

    let fixture = CartFixture::load(&config.cart)?;

    let names: FxHashMap<String, String> = fixture
        .items
        .iter()
        .filter_map(|item| item.name.clone().map(|name| (item.product.clone(), name)))
        .collect();

    let cart = fixture.into_cart(currency)?;

    let table = match &config.coupons {
        Some(path) => CouponTable::load(path)?,
        None => CouponTable::storefront()?,
    };

    let profile: Arc<dyn SessionStore> = match &config.profile {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    let policy = CouponPolicy::new(table);
    let used = UsedCoupons::new(profile);
    let engine = PricingEngine::new(PricingPolicy::storefront(cart.currency()));

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let coupon = select_coupon(config, &policy, &used, &engine, &cart, &mut handle)?;
    let pricing = engine.price(cart.lines(), coupon)?;

    OrderSummary::new(&cart, pricing, coupon.map(|coupon| coupon.code.clone()))
        .write_to(&mut handle, &names)?;

    writeln!(handle, "Amount payable: {}", format_total(&pricing.total))?;

    if let Some(coupon) = coupon.filter(|_| config.redeem) {
        if used.mark_used(&coupon.code)? {
            info!(code = %coupon.code, "coupon recorded as redeemed");
        }

        writeln!(handle, "Coupon {} recorded as redeemed.", coupon.code)?;
    }

    Ok(())
}

/// Validate the requested coupon, reporting a rejection instead of failing.
fn select_coupon<'p>(
    config: &QuoteConfig,
    policy: &'p CouponPolicy<'static>,
    used: &UsedCoupons,
    engine: &PricingEngine<'static>,
    cart: &Cart<'static>,
    out: &mut impl Write,
) -> Result<Option<&'p Coupon<'static>>, QuoteError> {
    let Some(code) = config.coupon.as_deref() else {
        return Ok(None);
    };

    let already_used = used.codes();

    let context = CouponContext {
        subtotal: engine.subtotal(cart.lines())?,
        is_first_order: config.first_order,
        already_used: &already_used,
    };

    match policy.validate(code, &context) {
        Ok(coupon) => Ok(Some(coupon)),
        Err(rejection) => {
            warn!(code, %rejection, "coupon not applied");
            writeln!(out, "Coupon {code} not applied: {rejection}")?;

            Ok(None)
        }
    }
}
