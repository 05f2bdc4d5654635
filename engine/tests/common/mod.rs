//! Shared set-up for the engine integration tests.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)] // Each test binary uses a different subset

use skyslot_core::store::SlotStore;
use skyslot_core::{Coupon, DiscountValue, OperatorId, Package, SlotId, TimeSlot, UserId};
use skyslot_engine::{
    BookingEnvironment, BookingRequest, CoordinatorSettings, InMemoryBackend, OperatorActions,
    ReservationCoordinator, RetryPolicy,
};
use skyslot_testing::faults::{
    FaultyBookingStore, FaultyCouponLedger, FaultyEntitlementStore, FaultyPackageStore,
    FaultySlotStore,
};
use skyslot_testing::{Faults, FixedClock, fixtures, test_clock};
use std::sync::Arc;
use std::time::Duration;

/// Settings with millisecond retries so failure tests stay fast.
pub fn fast_settings() -> CoordinatorSettings {
    let quick = |retries| {
        RetryPolicy::builder()
            .max_retries(retries)
            .initial_delay(Duration::from_millis(1))
            .jitter(0.0)
            .build()
    };
    CoordinatorSettings {
        request_timeout: Duration::from_secs(5),
        max_notes_len: 200,
        store_retry: quick(2),
        compensation_retry: quick(3),
    }
}

/// An operator with one package over in-memory stores.
pub struct Harness {
    pub backend: InMemoryBackend,
    pub faults: Faults,
    pub clock: FixedClock,
    pub coordinator: ReservationCoordinator,
    pub operator: OperatorActions,
    pub operator_id: OperatorId,
    pub package: Package,
}

impl Harness {
    /// Package at 50,000 per passenger, up to 4 passengers per booking.
    pub fn new() -> Self {
        Self::build(InMemoryBackend::new(), fast_settings())
    }

    pub fn with_settings(settings: CoordinatorSettings) -> Self {
        Self::build(InMemoryBackend::new(), settings)
    }

    pub fn with_backend(backend: InMemoryBackend) -> Self {
        Self::build(backend, fast_settings())
    }

    fn build(backend: InMemoryBackend, settings: CoordinatorSettings) -> Self {
        skyslot_testing::init_tracing();
        let clock = test_clock();
        let faults = Faults::new();
        let env = faulty(backend.environment(Arc::new(clock.clone())), &faults);
        let operator_id = OperatorId::new();
        let package = fixtures::package(operator_id, 50_000, 4);
        backend.packages.add(package.clone());
        Self {
            coordinator: ReservationCoordinator::new(env.clone(), settings.clone()),
            operator: OperatorActions::new(env, settings.store_retry),
            backend,
            faults,
            clock,
            operator_id,
            package,
        }
    }

    /// An empty Tuesday slot of this operator.
    pub async fn slot(&self, max_passengers: u32) -> TimeSlot {
        let slot = fixtures::slot(self.operator_id, fixtures::tuesday(), max_passengers);
        self.backend.slots.insert(slot.clone()).await.unwrap();
        slot
    }

    /// A second package of this operator gated at `rank`.
    pub fn gated_package(&self, rank: i32) -> Package {
        let mut package = fixtures::package(self.operator_id, 50_000, 4);
        package.min_tier_sort_order = Some(rank);
        self.backend.packages.add(package.clone());
        package
    }

    /// A coupon of this operator.
    pub fn coupon(&self, code: &str, value: DiscountValue) -> Coupon {
        let coupon = fixtures::coupon(self.operator_id, code, value);
        self.backend.coupons.add(coupon.clone());
        coupon
    }

    /// A request for `passengers` named passengers on the default package.
    pub fn request(&self, slot_id: SlotId, passengers: u32) -> BookingRequest {
        BookingRequest::new(
            UserId::new(),
            slot_id,
            self.package.id,
            fixtures::passengers(passengers),
        )
    }

    /// Occupied seats on a slot.
    pub fn seats(&self, slot_id: SlotId) -> u32 {
        self.backend.slots.snapshot(slot_id).unwrap().current_passengers
    }
}

/// Routes every contended store through the fault plan.
fn faulty(mut env: BookingEnvironment, faults: &Faults) -> BookingEnvironment {
    env.slots = Arc::new(FaultySlotStore::new(env.slots, faults.clone()));
    env.coupons = Arc::new(FaultyCouponLedger::new(env.coupons, faults.clone()));
    env.entitlements = Arc::new(FaultyEntitlementStore::new(env.entitlements, faults.clone()));
    env.bookings = Arc::new(FaultyBookingStore::new(env.bookings, faults.clone()));
    env.packages = Arc::new(FaultyPackageStore::new(env.packages, faults.clone()));
    env
}
