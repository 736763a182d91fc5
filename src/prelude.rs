//! Atlas & Arrow prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    api::{
        ApiError, CartService, OrdersService, PaymentGateway, PaymentOutcome, PaymentRequest,
    },
    cart::{Cart, CartError, CartItemRecord, CartLine, ProductRecord},
    checkout::{Checkout, CheckoutError, Collaborators},
    coupons::{
        Coupon, CouponCode, CouponDiscount, CouponKind, CouponTable, CouponTableError,
        policy::{
            AppliedCoupon, ApplyError, CouponContext, CouponPolicy, CouponRejection,
            check_eligibility,
        },
        redemptions::UsedCoupons,
    },
    orders::{
        AddressError, OrderItem, OrderPayload, OrderRecord, PaymentMethod, ShippingAddress,
        is_first_order,
    },
    pricing::{OrderPricing, PricingEngine, PricingError, PricingPolicy},
    session::{
        AdminUser, AuthSession, SessionUser,
        gate::{GateKind, GateState, GuardOutcome, SessionError, SessionGate, guard},
        watcher::{GateTrigger, GateWatcher, ViewEvent},
    },
    storage::{FileStore, MemoryStore, SessionStore, StorageEvent, StoreError},
    summary::{OrderSummary, SummaryError},
};
