//! Store wrappers that inject failures and latency.
//!
//! A [`Faults`] plan is shared between a test and the wrappers it installs.
//! The test arms an operation to fail the next `n` calls, or to stall for a
//! while before delegating, and the wrapper consults the plan on every call.
//!
//! ```
//! use skyslot_testing::{FaultOp, Faults, InMemoryBookingStore};
//! use skyslot_testing::faults::FaultyBookingStore;
//! use std::sync::Arc;
//!
//! let faults = Faults::new();
//! let bookings = FaultyBookingStore::new(Arc::new(InMemoryBookingStore::new()), faults.clone());
//! faults.fail_next(FaultOp::BookingInsert, 1);
//! # drop(bookings);
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use skyslot_core::store::{
    BookingStore, BoxFuture, CouponLedger, EntitlementStore, PackageStore, SlotStore,
};
use skyslot_core::{
    Booking, BookingId, BookingStatus, BookingStoreError, Coupon, CouponError, CouponId, DateTime,
    Entitlement, EntitlementError, EntitlementId, NaiveDate, OperatorId, Package, PackageId,
    SeatHold, SlotError, SlotId, StoreError, SupportTier, TimeSlot, UserId, Utc,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store operations a fault can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultOp {
    /// [`SlotStore::get`]
    SlotGet,
    /// [`SlotStore::reserve`]
    SlotReserve,
    /// [`SlotStore::release`]
    SlotRelease,
    /// [`CouponLedger::find_by_code`]
    CouponFind,
    /// [`CouponLedger::consume`]
    CouponConsume,
    /// [`CouponLedger::unconsume`]
    CouponUnconsume,
    /// [`EntitlementStore::current_for_user`]
    EntitlementCurrent,
    /// [`EntitlementStore::consume`]
    EntitlementConsume,
    /// [`BookingStore::insert`]
    BookingInsert,
    /// [`BookingStore::remove`]
    BookingRemove,
    /// [`BookingStore::transition`]
    BookingTransition,
    /// [`BookingStore::swap_seat_hold`]
    BookingSeatHold,
    /// [`PackageStore::get`]
    PackageGet,
}

#[derive(Debug, Default)]
struct Plan {
    failures: u32,
    delay: Option<Duration>,
    calls: u32,
}

/// Shared fault plan.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    plans: Arc<Mutex<HashMap<FaultOp, Plan>>>,
}

impl Faults {
    /// Create a plan with no faults armed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `op` fail with [`StoreError::Unavailable`]
    pub fn fail_next(&self, op: FaultOp, times: u32) {
        self.plans.lock().unwrap().entry(op).or_default().failures = times;
    }

    /// Stall every call of `op` for `delay` before delegating
    pub fn delay(&self, op: FaultOp, delay: Duration) {
        self.plans.lock().unwrap().entry(op).or_default().delay = Some(delay);
    }

    /// Disarm every fault; call counts are kept
    pub fn clear(&self) {
        for plan in self.plans.lock().unwrap().values_mut() {
            plan.failures = 0;
            plan.delay = None;
        }
    }

    /// How many times `op` was called through a wrapper
    #[must_use]
    pub fn calls(&self, op: FaultOp) -> u32 {
        self.plans.lock().unwrap().get(&op).map_or(0, |p| p.calls)
    }

    async fn check(&self, op: FaultOp) -> Result<(), StoreError> {
        let (fail, delay) = {
            let mut plans = self.plans.lock().unwrap();
            let plan = plans.entry(op).or_default();
            plan.calls += 1;
            let fail = plan.failures > 0;
            if fail {
                plan.failures -= 1;
            }
            (fail, plan.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Unavailable(format!("injected fault on {op:?}")));
        }
        Ok(())
    }
}

/// [`SlotStore`] wrapper.
#[derive(Clone)]
pub struct FaultySlotStore {
    inner: Arc<dyn SlotStore>,
    faults: Faults,
}

impl FaultySlotStore {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: Arc<dyn SlotStore>, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl SlotStore for FaultySlotStore {
    fn get(&self, slot_id: SlotId) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::SlotGet).await?;
            self.inner.get(slot_id).await
        })
    }

    fn insert(&self, slot: TimeSlot) -> BoxFuture<'_, Result<(), SlotError>> {
        self.inner.insert(slot)
    }

    fn reserve(&self, slot_id: SlotId, passengers: u32) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::SlotReserve).await?;
            self.inner.reserve(slot_id, passengers).await
        })
    }

    fn release(&self, slot_id: SlotId, passengers: u32) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::SlotRelease).await?;
            self.inner.release(slot_id, passengers).await
        })
    }

    fn set_closed(&self, slot_id: SlotId, closed: bool) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        self.inner.set_closed(slot_id, closed)
    }

    fn delete(&self, slot_id: SlotId) -> BoxFuture<'_, Result<(), SlotError>> {
        self.inner.delete(slot_id)
    }

    fn slots_on(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<TimeSlot>, SlotError>> {
        self.inner.slots_on(operator_id, date)
    }
}

/// [`CouponLedger`] wrapper.
#[derive(Clone)]
pub struct FaultyCouponLedger {
    inner: Arc<dyn CouponLedger>,
    faults: Faults,
}

impl FaultyCouponLedger {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: Arc<dyn CouponLedger>, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl CouponLedger for FaultyCouponLedger {
    fn find_by_code(
        &self,
        operator_id: OperatorId,
        normalized_code: String,
    ) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::CouponFind).await?;
            self.inner.find_by_code(operator_id, normalized_code).await
        })
    }

    fn consume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::CouponConsume).await?;
            self.inner.consume(coupon_id).await
        })
    }

    fn unconsume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<(), CouponError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::CouponUnconsume).await?;
            self.inner.unconsume(coupon_id).await
        })
    }
}

/// [`EntitlementStore`] wrapper.
#[derive(Clone)]
pub struct FaultyEntitlementStore {
    inner: Arc<dyn EntitlementStore>,
    faults: Faults,
}

impl FaultyEntitlementStore {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: Arc<dyn EntitlementStore>, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl EntitlementStore for FaultyEntitlementStore {
    fn tiers_for_operator(
        &self,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Vec<SupportTier>, EntitlementError>> {
        self.inner.tiers_for_operator(operator_id)
    }

    fn insert(&self, entitlement: Entitlement) -> BoxFuture<'_, Result<(), EntitlementError>> {
        self.inner.insert(entitlement)
    }

    fn current_for_user(
        &self,
        user_id: UserId,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Option<Entitlement>, EntitlementError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::EntitlementCurrent).await?;
            self.inner.current_for_user(user_id, operator_id).await
        })
    }

    fn consume(
        &self,
        entitlement_id: EntitlementId,
        booking_id: BookingId,
    ) -> BoxFuture<'_, Result<Entitlement, EntitlementError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::EntitlementConsume).await?;
            self.inner.consume(entitlement_id, booking_id).await
        })
    }
}

/// [`BookingStore`] wrapper.
#[derive(Clone)]
pub struct FaultyBookingStore {
    inner: Arc<dyn BookingStore>,
    faults: Faults,
}

impl FaultyBookingStore {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: Arc<dyn BookingStore>, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl BookingStore for FaultyBookingStore {
    fn insert(&self, booking: Booking) -> BoxFuture<'_, Result<(), BookingStoreError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::BookingInsert).await?;
            self.inner.insert(booking).await
        })
    }

    fn get(&self, booking_id: BookingId) -> BoxFuture<'_, Result<Booking, BookingStoreError>> {
        self.inner.get(booking_id)
    }

    fn remove(&self, booking_id: BookingId) -> BoxFuture<'_, Result<(), BookingStoreError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::BookingRemove).await?;
            self.inner.remove(booking_id).await
        })
    }

    fn transition(
        &self,
        booking_id: BookingId,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Booking, BookingStoreError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::BookingTransition).await?;
            self.inner.transition(booking_id, to, at).await
        })
    }

    fn swap_seat_hold(
        &self,
        booking_id: BookingId,
        expected: SeatHold,
        next: SeatHold,
    ) -> BoxFuture<'_, Result<Option<Booking>, BookingStoreError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::BookingSeatHold).await?;
            self.inner.swap_seat_hold(booking_id, expected, next).await
        })
    }
}

/// [`PackageStore`] wrapper.
#[derive(Clone)]
pub struct FaultyPackageStore {
    inner: Arc<dyn PackageStore>,
    faults: Faults,
}

impl FaultyPackageStore {
    /// Wrap `inner`
    #[must_use]
    pub fn new(inner: Arc<dyn PackageStore>, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl PackageStore for FaultyPackageStore {
    fn get(&self, package_id: PackageId) -> BoxFuture<'_, Result<Option<Package>, StoreError>> {
        Box::pin(async move {
            self.faults.check(FaultOp::PackageGet).await?;
            self.inner.get(package_id).await
        })
    }
}
