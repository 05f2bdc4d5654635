//! Coupon codes and their validation rules.

use crate::discount::DiscountValue;
use crate::error::CouponError;
use crate::types::{CouponId, OperatorId, PackageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A redeemable coupon code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Coupon id
    pub id: CouponId,
    /// Operator scope; codes are unique per operator
    pub operator_id: OperatorId,
    /// Normalized code (see [`normalize_code`])
    pub code: String,
    /// Discount granted
    pub value: DiscountValue,
    /// Package the coupon is bound to; `None` applies to any package
    pub package_id: Option<PackageId>,
    /// Last instant the coupon can be redeemed
    pub expires_at: Option<DateTime<Utc>>,
    /// Maximum number of redemptions; `None` is unlimited
    pub usage_limit: Option<u32>,
    /// Redemptions so far
    pub times_used: u32,
    /// Inactive coupons are rejected
    pub is_active: bool,
}

impl Coupon {
    /// Whether another redemption fits under the usage limit.
    #[must_use]
    pub const fn has_remaining_uses(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.times_used < limit,
            None => true,
        }
    }

    /// Checks the coupon can be applied to `package_id` at `now`.
    ///
    /// Checks run in a fixed order (active, expiry, package, limit) so the
    /// reported reason is stable.
    ///
    /// # Errors
    ///
    /// Returns the first rule the coupon fails.
    pub fn check(&self, package_id: PackageId, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.expires_at.is_some_and(|expiry| now > expiry) {
            return Err(CouponError::Expired);
        }
        if self.package_id.is_some_and(|bound| bound != package_id) {
            return Err(CouponError::PackageMismatch);
        }
        if !self.has_remaining_uses() {
            return Err(CouponError::LimitReached);
        }
        Ok(())
    }
}

/// Normalizes a user-supplied coupon code for lookup.
///
/// Strips every whitespace character and upper-cases the rest, so
/// `" summer 25 "` and `"SUMMER25"` name the same coupon.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
