//! Storefront API collaborators
//!
//! The remote REST API and the payment gateway are external. These traits are
//! the contract the checkout flow needs from them; transports implement them
//! and tests mock them.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::CartItemRecord,
    coupons::CouponCode,
    orders::{OrderPayload, OrderRecord},
};

/// Failures reported by the storefront API or payment gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The API rejected the session token (HTTP 401).
    #[error("your session has expired, please sign in again")]
    Unauthorized,

    /// The API refused access (HTTP 403).
    #[error("you are not allowed to do that, please sign in again")]
    Forbidden,

    /// Any other unsuccessful response.
    #[error("request failed with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,

        /// Message returned by the API.
        message: String,
    },

    /// The request did not complete.
    #[error("could not reach the store: {0}")]
    Network(String),
}

impl ApiError {
    /// Classify an unsuccessful HTTP response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden,
            _ => ApiError::Status {
                status,
                message: message.into(),
            },
        }
    }

    /// Whether the API rejected the session itself.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::Forbidden)
    }
}

/// Data handed to the payment gateway to start an online payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Amount payable, in minor units.
    pub amount: i64,

    /// ISO currency code.
    pub currency: String,

    /// Amount payable, in major units.
    #[serde(with = "rust_decimal::serde::float")]
    pub display_amount: Decimal,

    /// Line shown in the payment widget.
    pub description: String,

    /// Name of the paying customer, used to prefill the widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    /// Email of the paying customer, used to prefill the widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    /// Applied coupon, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<CouponCode>,
}

/// Result of the external payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The payment went through.
    Confirmed {
        /// Gateway payment reference.
        payment_id: String,
    },

    /// The gateway declined the payment.
    Failed {
        /// Reason reported by the gateway.
        reason: String,
    },

    /// The customer closed the payment widget.
    Cancelled,
}

/// Cart endpoint.
#[automock]
#[async_trait]
pub trait CartService: Send + Sync {
    /// Read the signed-in customer's cart. `None` means the API returned no list.
    async fn get_cart(&self, token: &str) -> Result<Option<Vec<CartItemRecord>>, ApiError>;
}

/// Order endpoints.
#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// List the signed-in customer's previous orders.
    async fn order_history(&self, token: &str) -> Result<Vec<OrderRecord>, ApiError>;

    /// Submit a paid (or cash-on-delivery) order.
    async fn create_order(
        &self,
        token: &str,
        payload: &OrderPayload,
    ) -> Result<OrderRecord, ApiError>;
}

/// External payment step.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Run the payment and report how it ended.
    async fn confirm(&self, request: &PaymentRequest) -> Result<PaymentOutcome, ApiError>;
}
