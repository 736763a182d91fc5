//! Checkout
//!
//! Drives one customer's checkout: fetches the cart and order history, applies
//! and re-validates a coupon as the cart changes, prices the order and, once
//! payment is confirmed, records the coupon redemption and submits the order.
//!
//! Nothing is redeemed or submitted until the payment step succeeds, so
//! abandoning checkout at any earlier point leaves no trace. A confirmed online
//! payment is kept until its order is created, so retrying a failed submission
//! never charges the customer twice, and the coupon is only redeemed once the
//! order exists.

use std::{fmt, sync::Arc};

use rusty_money::Money;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, CartService, OrdersService, PaymentGateway, PaymentOutcome, PaymentRequest},
    cart::{Cart, CartError, CartItemRecord},
    coupons::{
        Coupon, CouponCode,
        policy::{AppliedCoupon, ApplyError, CouponContext, CouponPolicy, CouponRejection},
        redemptions::UsedCoupons,
    },
    orders::{
        AddressError, OrderPayload, OrderRecord, PaymentMethod, ShippingAddress, is_first_order,
    },
    pricing::{OrderPricing, PricingEngine, PricingError, minor_to_major},
    session::gate::SessionGate,
};

/// Errors surfaced to the customer during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No session token is present.
    #[error("please sign in to continue")]
    SignedOut,

    /// There is nothing to order.
    #[error("your cart is empty")]
    EmptyCart,

    /// The shipping address is incomplete or malformed.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// The coupon cannot be applied.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// The API rejected the session; it has been cleared.
    #[error("your session has expired, please sign in again")]
    SessionExpired,

    /// The API call failed. Nothing is retried.
    #[error(transparent)]
    Api(ApiError),

    /// The payment step did not succeed.
    #[error("payment was not completed: {0}")]
    PaymentNotConfirmed(String),

    /// The order total changed after an online payment was taken.
    #[error("the order total changed after payment: paid {paid}, now {due}")]
    PaidTotalChanged {
        /// Amount already paid, formatted.
        paid: String,

        /// Amount now payable, formatted.
        due: String,
    },

    /// The cart returned by the API is invalid.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The order could not be priced.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<ApplyError> for CheckoutError {
    fn from(error: ApplyError) -> Self {
        match error {
            ApplyError::Rejected(rejection) => CheckoutError::Coupon(rejection),
            ApplyError::Pricing(error) => CheckoutError::Pricing(error),
        }
    }
}

/// External services the checkout talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Cart endpoint.
    pub carts: Arc<dyn CartService>,

    /// Order endpoints.
    pub orders: Arc<dyn OrdersService>,

    /// Payment step.
    pub payments: Arc<dyn PaymentGateway>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// A confirmed online payment whose order has not been created yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ConfirmedPayment {
    payment_id: String,
    amount: i64,
}

/// One customer's checkout.
#[derive(Debug)]
pub struct Checkout {
    gate: SessionGate,
    policy: CouponPolicy<'static>,
    used: UsedCoupons,
    engine: PricingEngine<'static>,
    services: Collaborators,
    cart: Cart<'static>,
    first_order: bool,
    applied: Option<CouponCode>,
    paid: Option<ConfirmedPayment>,
}

impl Checkout {
    /// Create a checkout with an empty cart. Call [`Checkout::load`] before use.
    pub fn new(
        gate: SessionGate,
        policy: CouponPolicy<'static>,
        used: UsedCoupons,
        engine: PricingEngine<'static>,
        services: Collaborators,
    ) -> Self {
        let cart = Cart::new(engine.currency());

        Checkout {
            gate,
            policy,
            used,
            engine,
            services,
            cart,
            first_order: false,
            applied: None,
            paid: None,
        }
    }

    /// The current cart.
    pub fn cart(&self) -> &Cart<'static> {
        &self.cart
    }

    /// Whether an online payment was confirmed for an order not yet created.
    pub fn has_confirmed_payment(&self) -> bool {
        self.paid.is_some()
    }

    /// Whether the customer has no previous orders, as of the last load.
    pub fn is_first_order(&self) -> bool {
        self.first_order
    }

    /// The applied coupon's code, if any.
    pub fn applied_coupon(&self) -> Option<&CouponCode> {
        self.applied.as_ref()
    }

    /// Fetch the cart, then the order history.
    ///
    /// An applied coupon is re-validated against the fresh cart; if it no
    /// longer qualifies it is dropped and the rejection returned.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the customer is signed out, a request
    /// fails or the cart is invalid.
    pub async fn load(&mut self) -> Result<Option<CouponRejection>, CheckoutError> {
        let token = self.gate.token().ok_or(CheckoutError::SignedOut)?;

        let records = match self.services.carts.get_cart(&token).await {
            Ok(records) => records,
            Err(error) => return Err(self.api_error(error)),
        };

        self.cart = Cart::from_records(records, self.engine.currency())?;

        let history = match self.services.orders.order_history(&token).await {
            Ok(history) => history,
            Err(error) => return Err(self.api_error(error)),
        };

        self.first_order = is_first_order(&history);

        debug!(
            lines = self.cart.len(),
            first_order = self.first_order,
            "checkout loaded"
        );

        self.revalidate()
    }

    /// Validate `code` against the current cart and apply it, replacing any
    /// previously applied coupon.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Coupon`]: the coupon does not apply.
    /// - [`CheckoutError::Pricing`]: the subtotal or discount cannot be computed.
    pub fn apply_coupon(&mut self, code: &str) -> Result<AppliedCoupon<'static>, CheckoutError> {
        let subtotal = self.engine.subtotal(self.cart.lines())?;
        let already_used = self.used.codes();

        let context = CouponContext {
            subtotal,
            is_first_order: self.first_order,
            already_used: &already_used,
        };

        let applied = match self.policy.apply(code, &context, &self.engine) {
            Ok(applied) => applied,
            Err(ApplyError::Rejected(rejection)) => {
                info!(code, %rejection, "coupon rejected");
                return Err(rejection.into());
            }
            Err(error) => return Err(error.into()),
        };

        info!(code = %applied.code, discount = %applied.discount, "coupon applied");

        self.applied = Some(applied.code.clone());

        Ok(applied)
    }

    /// Remove the applied coupon, returning its code.
    pub fn remove_coupon(&mut self) -> Option<CouponCode> {
        let removed = self.applied.take();

        if let Some(code) = &removed {
            debug!(%code, "coupon removed");
        }

        removed
    }

    /// Replace the cart with a fresh read from the API.
    ///
    /// An applied coupon is re-validated; if it no longer qualifies it is
    /// dropped and the rejection returned.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the cart is invalid or cannot be priced.
    pub fn update_cart(
        &mut self,
        records: Option<Vec<CartItemRecord>>,
    ) -> Result<Option<CouponRejection>, CheckoutError> {
        self.cart = Cart::from_records(records, self.engine.currency())?;

        self.revalidate()
    }

    /// Price the current cart with the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError::Pricing`] if any amount cannot be computed.
    pub fn pricing(&self) -> Result<OrderPricing<'static>, CheckoutError> {
        Ok(self.engine.price(self.cart.lines(), self.coupon())?)
    }

    /// Build the request handed to the payment gateway.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError::Pricing`] if the total cannot be computed.
    pub fn payment_request(&self) -> Result<PaymentRequest, CheckoutError> {
        let total = self.pricing()?.total;
        let customer = self.gate.current_user();

        Ok(PaymentRequest {
            amount: total.to_minor_units(),
            currency: total.currency().iso_alpha_code.to_string(),
            display_amount: minor_to_major(&total),
            description: format!("Atlas & Arrow order of {} item(s)", self.cart.len()),
            customer_name: customer.as_ref().map(|user| user.fullname.clone()),
            customer_email: customer.map(|user| user.email),
            coupon_code: self.applied.clone(),
        })
    }

    /// Take payment and submit the order.
    ///
    /// Online payments go through the gateway first; cash on delivery counts as
    /// confirmed. Only after confirmation is the order submitted, and only once
    /// it is created is the coupon marked used and the cart and coupon cleared.
    ///
    /// If submission fails after an online payment, the payment is kept and the
    /// next call submits the order again without charging, whatever
    /// `payment_method` it is given.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::SignedOut`]: no session token is present.
    /// - [`CheckoutError::EmptyCart`]: there is nothing to order.
    /// - [`CheckoutError::Address`]: the shipping address is invalid.
    /// - [`CheckoutError::Coupon`]: the applied coupon no longer qualifies and was dropped.
    /// - [`CheckoutError::PaymentNotConfirmed`]: the payment failed or was cancelled.
    /// - [`CheckoutError::PaidTotalChanged`]: the total no longer matches a kept payment.
    /// - [`CheckoutError::SessionExpired`]: the API rejected the session.
    /// - [`CheckoutError::Api`]: a request failed.
    pub async fn place_order(
        &mut self,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
    ) -> Result<OrderRecord, CheckoutError> {
        let token = self.gate.token().ok_or(CheckoutError::SignedOut)?;

        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        shipping_address.validate()?;

        if let Some(rejection) = self.revalidate()? {
            return Err(rejection.into());
        }

        let pricing = self.pricing()?;

        let due = pricing.total.to_minor_units();

        let (payment_method, payment_id) = match (self.paid.clone(), payment_method) {
            (Some(paid), _) if paid.amount != due => {
                warn!(
                    payment_id = %paid.payment_id,
                    paid = paid.amount,
                    due,
                    "order total changed after payment"
                );

                return Err(CheckoutError::PaidTotalChanged {
                    paid: Money::from_minor(paid.amount, pricing.total.currency()).to_string(),
                    due: pricing.total.to_string(),
                });
            }
            (Some(paid), _) => {
                debug!(payment_id = %paid.payment_id, "resubmitting an already paid order");
                (PaymentMethod::Online, Some(paid.payment_id))
            }
            (None, PaymentMethod::CashOnDelivery) => (PaymentMethod::CashOnDelivery, None),
            (None, PaymentMethod::Online) => {
                let payment_id = self.confirm_payment().await?;

                self.paid = Some(ConfirmedPayment {
                    payment_id: payment_id.clone(),
                    amount: due,
                });

                (PaymentMethod::Online, Some(payment_id))
            }
        };

        let payload = OrderPayload::new(
            &self.cart,
            &pricing,
            shipping_address,
            payment_method,
            self.applied.clone(),
            payment_id,
        );

        let order = match self.services.orders.create_order(&token, &payload).await {
            Ok(order) => order,
            Err(error) => return Err(self.api_error(error)),
        };

        info!(order = %order.id, total = %pricing.total, ?payment_method, "order placed");

        if let Some(code) = &self.applied {
            self.record_redemption(code);
        }

        self.paid = None;
        self.cart = Cart::new(self.engine.currency());
        self.applied = None;
        self.first_order = false;

        Ok(order)
    }

    async fn confirm_payment(&self) -> Result<String, CheckoutError> {
        let request = self.payment_request()?;

        match self.services.payments.confirm(&request).await {
            Ok(PaymentOutcome::Confirmed { payment_id }) => {
                debug!(%payment_id, "payment confirmed");
                Ok(payment_id)
            }
            Ok(PaymentOutcome::Failed { reason }) => {
                warn!(%reason, "payment failed");
                Err(CheckoutError::PaymentNotConfirmed(reason))
            }
            Ok(PaymentOutcome::Cancelled) => {
                info!("payment cancelled");
                Err(CheckoutError::PaymentNotConfirmed(
                    "the payment was cancelled".to_string(),
                ))
            }
            Err(error) => Err(self.api_error(error)),
        }
    }

    /// Record a redemption. The order already exists, so storage failures are only logged.
    fn record_redemption(&self, code: &CouponCode) {
        match self.used.mark_used(code) {
            Ok(true) => info!(%code, "coupon redeemed"),
            Ok(false) => debug!(%code, "coupon was already redeemed"),
            Err(error) => warn!(%code, %error, "failed to record coupon redemption"),
        }
    }

    fn coupon(&self) -> Option<&Coupon<'static>> {
        self.applied
            .as_ref()
            .and_then(|code| self.policy.table().get(code))
    }

    /// Re-check the applied coupon against the current cart, dropping it if it
    /// no longer qualifies.
    fn revalidate(&mut self) -> Result<Option<CouponRejection>, CheckoutError> {
        let Some(code) = self.applied.clone() else {
            return Ok(None);
        };

        let subtotal = self.engine.subtotal(self.cart.lines())?;
        let already_used = self.used.codes();

        let context = CouponContext {
            subtotal,
            is_first_order: self.first_order,
            already_used: &already_used,
        };

        match self.policy.validate(code.as_str(), &context) {
            Ok(_) => Ok(None),
            Err(rejection) => {
                info!(%code, %rejection, "applied coupon no longer qualifies, removing it");
                self.applied = None;

                Ok(Some(rejection))
            }
        }
    }

    fn api_error(&self, error: ApiError) -> CheckoutError {
        if self.gate.handle_api_error(&error) {
            return CheckoutError::SessionExpired;
        }

        warn!(%error, "storefront request failed");

        CheckoutError::Api(error)
    }
}
