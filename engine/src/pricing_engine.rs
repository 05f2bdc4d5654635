//! Price quotes from stored packages, discounts, campaigns and coupons.
//!
//! The arithmetic lives in [`skyslot_core::pricing::compute_price`]; this
//! service only gathers its inputs. Loading is read-only, so transient store
//! failures are retried.

use crate::error::BookingError;
use crate::retry::{RetryPolicy, retry_transient};
use skyslot_core::coupon::normalize_code;
use skyslot_core::environment::Clock;
use skyslot_core::pricing::{PriceInput, compute_price};
use skyslot_core::store::{CouponLedger, DiscountCatalog, PackageStore};
use skyslot_core::{Coupon, DateTime, NaiveDate, Package, PackageId, PriceBreakdown, Utc};
use std::sync::Arc;

/// A computed price and the coupon that went into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    /// Itemized computation
    pub breakdown: PriceBreakdown,
    /// The validated coupon, when one was supplied
    pub coupon: Option<Coupon>,
}

/// Computes price breakdowns.
#[derive(Clone)]
pub struct PricingEngine {
    packages: Arc<dyn PackageStore>,
    catalog: Arc<dyn DiscountCatalog>,
    coupons: Arc<dyn CouponLedger>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl PricingEngine {
    /// Create a pricing engine.
    #[must_use]
    pub fn new(
        packages: Arc<dyn PackageStore>,
        catalog: Arc<dyn DiscountCatalog>,
        coupons: Arc<dyn CouponLedger>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            packages,
            catalog,
            coupons,
            clock,
            retry,
        }
    }

    /// Prices `passenger_count` passengers on `package_id` for a slot on
    /// `slot_date`, purchased now.
    ///
    /// Identical inputs at the same instant give identical breakdowns.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown package
    /// - [`BookingError::InvalidInput`] for an inactive package or a passenger
    ///   count outside the package limits
    /// - [`BookingError::InvalidCoupon`] when the coupon fails validation
    /// - [`BookingError::StoreUnavailable`] when a store keeps failing
    pub async fn compute_price(
        &self,
        package_id: PackageId,
        slot_date: NaiveDate,
        passenger_count: u32,
        coupon_code: Option<&str>,
    ) -> Result<PriceBreakdown, BookingError> {
        let package = self.load_package(package_id).await?;
        let quote = self
            .quote(&package, slot_date, passenger_count, coupon_code, self.clock.now())
            .await?;
        Ok(quote.breakdown)
    }

    /// Loads an active package.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`], [`BookingError::InvalidInput`] when the
    /// package is inactive, or a store failure.
    pub async fn load_package(&self, package_id: PackageId) -> Result<Package, BookingError> {
        let package = retry_transient(&self.retry, || self.packages.get(package_id))
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("package {package_id}")))?;
        if !package.is_active {
            return Err(BookingError::InvalidInput(format!(
                "package {package_id} is not active"
            )));
        }
        Ok(package)
    }

    /// Prices against an already loaded package at `purchased_at`.
    ///
    /// A blank coupon code counts as no coupon.
    ///
    /// # Errors
    ///
    /// As [`PricingEngine::compute_price`], minus package lookup.
    pub async fn quote(
        &self,
        package: &Package,
        slot_date: NaiveDate,
        passenger_count: u32,
        coupon_code: Option<&str>,
        purchased_at: DateTime<Utc>,
    ) -> Result<Quote, BookingError> {
        let coupon = match coupon_code.filter(|c| !normalize_code(c).is_empty()) {
            Some(code) => Some(
                retry_transient(&self.retry, || {
                    self.coupons
                        .validate(package.operator_id, code, package.id, purchased_at)
                })
                .await?,
            ),
            None => None,
        };

        let discounts = retry_transient(&self.retry, || {
            self.catalog.applicable_discounts(package.id, slot_date)
        })
        .await?;
        let campaigns = retry_transient(&self.retry, || {
            self.catalog.applicable_campaigns(package.id, purchased_at)
        })
        .await?;

        let breakdown = compute_price(&PriceInput {
            base_price: package.base_price,
            passenger_count,
            max_passengers: package.max_passengers,
            slot_date,
            purchased_at,
            discounts: &discounts,
            campaigns: &campaigns,
            coupon: coupon.as_ref(),
        })?;

        tracing::debug!(
            package_id = %package.id,
            passenger_count,
            subtotal = breakdown.subtotal.minor(),
            final_price = breakdown.final_price.minor(),
            adjustments = breakdown.adjustments.len(),
            "Price computed"
        );
        Ok(Quote { breakdown, coupon })
    }
}
