//! Atlas & Arrow
//!
//! Storefront core for the Atlas & Arrow business-technology shop: the session
//! gate that protects customer and admin views, the pricing engine behind the
//! order summary, and the coupon rules with their redemption tracking.

pub mod api;
pub mod cart;
pub mod checkout;
pub mod coupons;
pub mod fixtures;
pub mod orders;
pub mod prelude;
pub mod pricing;
pub mod session;
pub mod storage;
pub mod summary;
