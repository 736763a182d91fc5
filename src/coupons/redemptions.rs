//! Redeemed coupons
//!
//! The set of coupon codes this browser profile has redeemed, stored as a JSON
//! array under [`keys::USED_COUPONS`]. The set only grows.
//!
//! Reads fail open: a missing, unreadable or corrupt entry is an empty set, so
//! damaged storage never locks a customer out of a coupon. The session gate
//! does the opposite for credentials.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::{
    coupons::CouponCode,
    storage::{SessionStore, StoreError, keys},
};

/// Persisted set of redeemed coupon codes.
#[derive(Clone)]
pub struct UsedCoupons {
    store: Arc<dyn SessionStore>,
}

impl UsedCoupons {
    /// Track redemptions in `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        UsedCoupons { store }
    }

    /// Codes redeemed so far. Unreadable storage yields an empty set.
    pub fn codes(&self) -> FxHashSet<CouponCode> {
        let raw = match self.store.get(keys::USED_COUPONS) {
            Ok(Some(raw)) => raw,
            Ok(None) => return FxHashSet::default(),
            Err(error) => {
                warn!(%error, "failed to read used coupons, treating as none used");
                return FxHashSet::default();
            }
        };

        match serde_json::from_str::<Vec<CouponCode>>(&raw) {
            Ok(codes) => codes.into_iter().collect(),
            Err(error) => {
                warn!(%error, "used coupons entry is corrupt, treating as none used");
                FxHashSet::default()
            }
        }
    }

    /// Check whether `code` has been redeemed.
    pub fn contains(&self, code: &CouponCode) -> bool {
        self.codes().contains(code)
    }

    /// Record a redemption of `code`. Returns `false` if it was already recorded.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the updated set cannot be written.
    pub fn mark_used(&self, code: &CouponCode) -> Result<bool, StoreError> {
        let mut codes = self.codes();

        if !codes.insert(code.clone()) {
            debug!(%code, "coupon already marked as used");
            return Ok(false);
        }

        let mut codes: Vec<CouponCode> = codes.into_iter().collect();
        codes.sort_unstable();

        self.store
            .set(keys::USED_COUPONS, &serde_json::to_string(&codes)?)?;

        debug!(%code, "coupon marked as used");

        Ok(true)
    }
}

impl fmt::Debug for UsedCoupons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsedCoupons").finish_non_exhaustive()
    }
}
