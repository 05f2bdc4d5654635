//! Storage contracts.
//!
//! Every store is a `Send + Sync` trait object shared across request
//! handlers. Methods return boxed futures rather than using `async fn` so the
//! traits stay dyn-compatible (`Arc<dyn SlotStore>`).
//!
//! The contended rows are slots, coupons and entitlements. For those the
//! mutating methods are linearizable check-and-update operations per row:
//! two concurrent calls can never both observe the same "last" seat or use.

use crate::booking::{Booking, BookingNotification, BookingStatus, Package, SeatHold};
use crate::coupon::{Coupon, normalize_code};
use crate::discount::{Campaign, Discount};
use crate::entitlement::{Entitlement, SupportTier};
use crate::error::{
    BookingStoreError, CouponError, EntitlementError, NotifyError, SlotError, StoreError,
};
use crate::slot::TimeSlot;
use crate::types::{BookingId, CouponId, EntitlementId, OperatorId, PackageId, SlotId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by every store method.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persisted time slots with capacity counters.
pub trait SlotStore: Send + Sync {
    /// Loads a slot.
    ///
    /// # Errors
    ///
    /// [`SlotError::NotFound`] or a backend failure.
    fn get(&self, slot_id: SlotId) -> BoxFuture<'_, Result<TimeSlot, SlotError>>;

    /// Persists a newly scheduled slot.
    ///
    /// # Errors
    ///
    /// A backend failure, or [`StoreError::Conflict`] if the id exists.
    fn insert(&self, slot: TimeSlot) -> BoxFuture<'_, Result<(), SlotError>>;

    /// Atomically occupies `passengers` seats.
    ///
    /// The capacity check, the closed check and the increment happen as one
    /// indivisible step per slot. Returns the slot after the change.
    ///
    /// # Errors
    ///
    /// [`SlotError::Full`], [`SlotError::Closed`], [`SlotError::NotFound`]
    /// or a backend failure. No seats are held on error.
    fn reserve(&self, slot_id: SlotId, passengers: u32)
    -> BoxFuture<'_, Result<TimeSlot, SlotError>>;

    /// Atomically frees `passengers` seats. Returns the slot after the change.
    ///
    /// # Errors
    ///
    /// [`SlotError::NotFound`], [`SlotError::ReleaseExceedsOccupancy`] or a
    /// backend failure.
    fn release(&self, slot_id: SlotId, passengers: u32)
    -> BoxFuture<'_, Result<TimeSlot, SlotError>>;

    /// Sets or lifts the operator's closed override.
    ///
    /// # Errors
    ///
    /// [`SlotError::NotFound`] or a backend failure.
    fn set_closed(&self, slot_id: SlotId, closed: bool)
    -> BoxFuture<'_, Result<TimeSlot, SlotError>>;

    /// Deletes a slot, atomically refusing while any seat is held.
    ///
    /// # Errors
    ///
    /// [`SlotError::InUse`], [`SlotError::NotFound`] or a backend failure.
    fn delete(&self, slot_id: SlotId) -> BoxFuture<'_, Result<(), SlotError>>;

    /// Every slot an operator flies on `date`, ordered by start time.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn slots_on(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<TimeSlot>, SlotError>>;
}

/// Persisted coupons and their usage counters.
pub trait CouponLedger: Send + Sync {
    /// Looks a coupon up by its already normalized code.
    ///
    /// # Errors
    ///
    /// [`CouponError::NotFound`] or a backend failure.
    fn find_by_code(
        &self,
        operator_id: OperatorId,
        normalized_code: String,
    ) -> BoxFuture<'_, Result<Coupon, CouponError>>;

    /// Atomically records one redemption, re-checking the usage limit at
    /// write time. Returns the coupon after the change.
    ///
    /// # Errors
    ///
    /// [`CouponError::LimitReached`], [`CouponError::NotFound`] or a backend
    /// failure.
    fn consume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<Coupon, CouponError>>;

    /// Takes back one redemption recorded by [`CouponLedger::consume`].
    ///
    /// Only used to compensate a booking attempt that failed after the coupon
    /// was consumed; cancellations do not call it.
    ///
    /// # Errors
    ///
    /// [`CouponError::NotFound`] or a backend failure.
    fn unconsume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<(), CouponError>>;

    /// Validates a user-supplied code without mutating anything.
    ///
    /// # Errors
    ///
    /// The first rule the coupon fails, [`CouponError::NotFound`] or a
    /// backend failure.
    fn validate(
        &self,
        operator_id: OperatorId,
        code: &str,
        package_id: PackageId,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        let normalized = normalize_code(code);
        Box::pin(async move {
            let coupon = self.find_by_code(operator_id, normalized).await?;
            coupon.check(package_id, now)?;
            Ok(coupon)
        })
    }
}

/// Persisted support tiers and per-user entitlements.
pub trait EntitlementStore: Send + Sync {
    /// Every support tier an operator defines.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn tiers_for_operator(
        &self,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Vec<SupportTier>, EntitlementError>>;

    /// Records a granted entitlement.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn insert(&self, entitlement: Entitlement) -> BoxFuture<'_, Result<(), EntitlementError>>;

    /// The user's most recently granted unconsumed entitlement from one of
    /// `operator_id`'s tiers. Tier ranks only compare within an operator.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn current_for_user(
        &self,
        user_id: UserId,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Option<Entitlement>, EntitlementError>>;

    /// Atomically marks an entitlement spent by `booking_id`, refusing if it
    /// was already spent. There is no reverse operation.
    ///
    /// # Errors
    ///
    /// [`EntitlementError::AlreadyConsumed`], [`EntitlementError::NotFound`]
    /// or a backend failure.
    fn consume(
        &self,
        entitlement_id: EntitlementId,
        booking_id: BookingId,
    ) -> BoxFuture<'_, Result<Entitlement, EntitlementError>>;
}

/// Standing discounts and campaigns per package. Read-only.
pub trait DiscountCatalog: Send + Sync {
    /// Every standing discount defined for a package, active or not.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn discounts_for_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Vec<Discount>, StoreError>>;

    /// Every campaign defined for a package, active or not.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn campaigns_for_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Vec<Campaign>, StoreError>>;

    /// Active standing discounts whose condition matches the slot date.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn applicable_discounts(
        &self,
        package_id: PackageId,
        slot_date: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<Discount>, StoreError>> {
        Box::pin(async move {
            let mut discounts = self.discounts_for_package(package_id).await?;
            discounts.retain(|d| d.applies_on(slot_date));
            Ok(discounts)
        })
    }

    /// Active campaigns whose window contains the purchase instant.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn applicable_campaigns(
        &self,
        package_id: PackageId,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Campaign>, StoreError>> {
        Box::pin(async move {
            let mut campaigns = self.campaigns_for_package(package_id).await?;
            campaigns.retain(|c| c.is_running(now));
            Ok(campaigns)
        })
    }
}

/// Read access to packages.
pub trait PackageStore: Send + Sync {
    /// Loads a package, `None` when absent.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn get(&self, package_id: PackageId) -> BoxFuture<'_, Result<Option<Package>, StoreError>>;
}

/// Persisted bookings.
pub trait BookingStore: Send + Sync {
    /// Persists a new booking.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn insert(&self, booking: Booking) -> BoxFuture<'_, Result<(), BookingStoreError>>;

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// [`BookingStoreError::NotFound`] or a backend failure.
    fn get(&self, booking_id: BookingId) -> BoxFuture<'_, Result<Booking, BookingStoreError>>;

    /// Removes a booking written by a failed attempt.
    ///
    /// # Errors
    ///
    /// [`BookingStoreError::NotFound`] or a backend failure.
    fn remove(&self, booking_id: BookingId) -> BoxFuture<'_, Result<(), BookingStoreError>>;

    /// Atomically moves a booking to `to` if its current status is one of
    /// [`BookingStatus::allowed_sources`]. Returns the booking after the change.
    ///
    /// Moving to [`BookingStatus::Cancelled`] also sets the seat hold to
    /// [`SeatHold::Releasing`] in the same write.
    ///
    /// # Errors
    ///
    /// [`BookingStoreError::InvalidTransition`], [`BookingStoreError::NotFound`]
    /// or a backend failure.
    fn transition(
        &self,
        booking_id: BookingId,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Booking, BookingStoreError>>;

    /// Atomically sets the seat hold to `next` if it is currently `expected`.
    /// Returns `None` when the booking holds another value.
    ///
    /// # Errors
    ///
    /// [`BookingStoreError::NotFound`] or a backend failure.
    fn swap_seat_hold(
        &self,
        booking_id: BookingId,
        expected: SeatHold,
        next: SeatHold,
    ) -> BoxFuture<'_, Result<Option<Booking>, BookingStoreError>>;
}

/// The identity provider's view of a user.
pub trait IdentityProvider: Send + Sync {
    /// Whether the user exists and is in active status.
    ///
    /// # Errors
    ///
    /// A backend failure.
    fn is_active(&self, user_id: UserId) -> BoxFuture<'_, Result<bool, StoreError>>;
}

/// Asynchronous delivery of booking lifecycle events.
pub trait Notifier: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Delivery failure; callers log it and move on.
    fn notify(&self, notification: BookingNotification) -> BoxFuture<'_, Result<(), NotifyError>>;
}
