//! Collaborators the engine services run against.

use skyslot_core::environment::{Clock, SystemClock};
use skyslot_core::store::{
    BookingStore, CouponLedger, DiscountCatalog, EntitlementStore, IdentityProvider, Notifier,
    PackageStore, SlotStore,
};
use skyslot_testing::{
    InMemoryBookingStore, InMemoryCouponLedger, InMemoryDiscountCatalog, InMemoryEntitlementStore,
    InMemoryIdentityProvider, InMemoryPackageStore, InMemorySlotStore, RecordingNotifier,
};
use std::sync::Arc;

/// Every store, the identity provider, the notifier and the clock.
///
/// Cheap to clone; all members are shared trait objects.
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Slot capacity
    pub slots: Arc<dyn SlotStore>,
    /// Coupons and usage counters
    pub coupons: Arc<dyn CouponLedger>,
    /// Tiers and entitlements
    pub entitlements: Arc<dyn EntitlementStore>,
    /// Standing discounts and campaigns
    pub catalog: Arc<dyn DiscountCatalog>,
    /// Packages
    pub packages: Arc<dyn PackageStore>,
    /// Bookings
    pub bookings: Arc<dyn BookingStore>,
    /// User status
    pub identity: Arc<dyn IdentityProvider>,
    /// Lifecycle notifications
    pub notifier: Arc<dyn Notifier>,
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
}

/// Concrete handles on an in-memory environment, for seeding data.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    /// Slots
    pub slots: InMemorySlotStore,
    /// Coupons
    pub coupons: InMemoryCouponLedger,
    /// Tiers and entitlements
    pub entitlements: InMemoryEntitlementStore,
    /// Discounts and campaigns
    pub catalog: InMemoryDiscountCatalog,
    /// Packages
    pub packages: InMemoryPackageStore,
    /// Bookings
    pub bookings: InMemoryBookingStore,
    /// Identity
    pub identity: InMemoryIdentityProvider,
    /// Notifications
    pub notifier: RecordingNotifier,
}

impl InMemoryBackend {
    /// Create empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment over these stores with the given clock.
    #[must_use]
    pub fn environment(&self, clock: Arc<dyn Clock>) -> BookingEnvironment {
        BookingEnvironment {
            slots: Arc::new(self.slots.clone()),
            coupons: Arc::new(self.coupons.clone()),
            entitlements: Arc::new(self.entitlements.clone()),
            catalog: Arc::new(self.catalog.clone()),
            packages: Arc::new(self.packages.clone()),
            bookings: Arc::new(self.bookings.clone()),
            identity: Arc::new(self.identity.clone()),
            notifier: Arc::new(self.notifier.clone()),
            clock,
        }
    }

    /// An environment over these stores with the system clock.
    #[must_use]
    pub fn system_environment(&self) -> BookingEnvironment {
        self.environment(Arc::new(SystemClock))
    }
}
