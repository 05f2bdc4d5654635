//! In-memory store implementations.
//!
//! Each store keeps its rows behind one `RwLock`. Check-and-update
//! operations (reserve, coupon consume, entitlement consume, booking
//! transitions) run entirely under the write lock, which makes them
//! linearizable per store, a stronger guarantee than the per-row one the
//! contracts require.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on lock poisoning

use skyslot_core::coupon::normalize_code;
use skyslot_core::entitlement::current_entitlement;
use skyslot_core::store::{
    BookingStore, BoxFuture, CouponLedger, DiscountCatalog, EntitlementStore, IdentityProvider,
    Notifier, PackageStore, SlotStore,
};
use skyslot_core::{
    Booking, BookingId, BookingNotification, BookingStatus, BookingStoreError, Campaign, Coupon,
    CouponError, CouponId, DateTime, Discount, Entitlement, EntitlementError, EntitlementId,
    NaiveDate, NotifyError, OperatorId, Package, PackageId, SeatHold, SlotError, SlotId,
    StoreError, SupportTier, TimeSlot, UserId, Utc,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

// ============================================================================
// Slots
// ============================================================================

/// In-memory [`SlotStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemorySlotStore {
    slots: Arc<RwLock<HashMap<SlotId, TimeSlot>>>,
}

impl InMemorySlotStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a slot, for assertions
    #[must_use]
    pub fn snapshot(&self, slot_id: SlotId) -> Option<TimeSlot> {
        self.slots.read().unwrap().get(&slot_id).cloned()
    }

    /// Number of stored slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().unwrap().is_empty()
    }

    fn mutate<T>(
        &self,
        slot_id: SlotId,
        f: impl FnOnce(&mut TimeSlot) -> Result<T, SlotError>,
    ) -> Result<T, SlotError> {
        let mut slots = self.slots.write().unwrap();
        let slot = slots.get_mut(&slot_id).ok_or(SlotError::NotFound(slot_id))?;
        // Work on a copy so a refused change leaves the row untouched.
        let mut next = slot.clone();
        let out = f(&mut next)?;
        *slot = next;
        Ok(out)
    }
}

impl SlotStore for InMemorySlotStore {
    fn get(&self, slot_id: SlotId) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move { self.snapshot(slot_id).ok_or(SlotError::NotFound(slot_id)) })
    }

    fn insert(&self, slot: TimeSlot) -> BoxFuture<'_, Result<(), SlotError>> {
        Box::pin(async move {
            let mut slots = self.slots.write().unwrap();
            if slots.contains_key(&slot.id) {
                return Err(StoreError::Conflict(format!("slot {} exists", slot.id)).into());
            }
            slots.insert(slot.id, slot);
            Ok(())
        })
    }

    fn reserve(&self, slot_id: SlotId, passengers: u32) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            self.mutate(slot_id, |slot| {
                slot.apply_reserve(passengers)?;
                Ok(slot.clone())
            })
        })
    }

    fn release(&self, slot_id: SlotId, passengers: u32) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            self.mutate(slot_id, |slot| {
                slot.apply_release(passengers)?;
                Ok(slot.clone())
            })
        })
    }

    fn set_closed(&self, slot_id: SlotId, closed: bool) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            self.mutate(slot_id, |slot| {
                if closed {
                    slot.close();
                } else {
                    slot.reopen();
                }
                Ok(slot.clone())
            })
        })
    }

    fn delete(&self, slot_id: SlotId) -> BoxFuture<'_, Result<(), SlotError>> {
        Box::pin(async move {
            let mut slots = self.slots.write().unwrap();
            let slot = slots.get(&slot_id).ok_or(SlotError::NotFound(slot_id))?;
            slot.check_deletable()?;
            slots.remove(&slot_id);
            Ok(())
        })
    }

    fn slots_on(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<TimeSlot>, SlotError>> {
        Box::pin(async move {
            let mut found: Vec<TimeSlot> = self
                .slots
                .read()
                .unwrap()
                .values()
                .filter(|s| s.operator_id == operator_id && s.date == date)
                .cloned()
                .collect();
            found.sort_by_key(|s| (s.start_time, s.id));
            Ok(found)
        })
    }
}

// ============================================================================
// Coupons
// ============================================================================

/// In-memory [`CouponLedger`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryCouponLedger {
    coupons: Arc<RwLock<HashMap<CouponId, Coupon>>>,
}

impl InMemoryCouponLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a coupon, normalizing its code
    pub fn add(&self, mut coupon: Coupon) {
        coupon.code = normalize_code(&coupon.code);
        self.coupons.write().unwrap().insert(coupon.id, coupon);
    }

    /// Current state of a coupon, for assertions
    #[must_use]
    pub fn snapshot(&self, coupon_id: CouponId) -> Option<Coupon> {
        self.coupons.read().unwrap().get(&coupon_id).cloned()
    }
}

impl CouponLedger for InMemoryCouponLedger {
    fn find_by_code(
        &self,
        operator_id: OperatorId,
        normalized_code: String,
    ) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        Box::pin(async move {
            self.coupons
                .read()
                .unwrap()
                .values()
                .find(|c| c.operator_id == operator_id && c.code == normalized_code)
                .cloned()
                .ok_or(CouponError::NotFound(normalized_code))
        })
    }

    fn consume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        Box::pin(async move {
            let mut coupons = self.coupons.write().unwrap();
            let coupon = coupons
                .get_mut(&coupon_id)
                .ok_or_else(|| CouponError::NotFound(coupon_id.to_string()))?;
            if !coupon.has_remaining_uses() {
                return Err(CouponError::LimitReached);
            }
            coupon.times_used += 1;
            Ok(coupon.clone())
        })
    }

    fn unconsume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<(), CouponError>> {
        Box::pin(async move {
            let mut coupons = self.coupons.write().unwrap();
            let coupon = coupons
                .get_mut(&coupon_id)
                .ok_or_else(|| CouponError::NotFound(coupon_id.to_string()))?;
            coupon.times_used = coupon.times_used.saturating_sub(1);
            Ok(())
        })
    }
}

// ============================================================================
// Entitlements
// ============================================================================

/// In-memory [`EntitlementStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryEntitlementStore {
    tiers: Arc<RwLock<Vec<SupportTier>>>,
    entitlements: Arc<RwLock<HashMap<EntitlementId, Entitlement>>>,
}

impl InMemoryEntitlementStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a support tier
    pub fn add_tier(&self, tier: SupportTier) {
        self.tiers.write().unwrap().push(tier);
    }

    /// Record an entitlement directly
    pub fn add(&self, entitlement: Entitlement) {
        self.entitlements
            .write()
            .unwrap()
            .insert(entitlement.id, entitlement);
    }

    /// Current state of an entitlement, for assertions
    #[must_use]
    pub fn snapshot(&self, entitlement_id: EntitlementId) -> Option<Entitlement> {
        self.entitlements.read().unwrap().get(&entitlement_id).cloned()
    }
}

impl EntitlementStore for InMemoryEntitlementStore {
    fn tiers_for_operator(
        &self,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Vec<SupportTier>, EntitlementError>> {
        Box::pin(async move {
            Ok(self
                .tiers
                .read()
                .unwrap()
                .iter()
                .filter(|t| t.operator_id == operator_id)
                .cloned()
                .collect())
        })
    }

    fn insert(&self, entitlement: Entitlement) -> BoxFuture<'_, Result<(), EntitlementError>> {
        Box::pin(async move {
            self.add(entitlement);
            Ok(())
        })
    }

    fn current_for_user(
        &self,
        user_id: UserId,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Option<Entitlement>, EntitlementError>> {
        Box::pin(async move {
            let entitlements = self.entitlements.read().unwrap();
            let mine = entitlements
                .values()
                .filter(|e| e.user_id == user_id && e.operator_id == operator_id);
            Ok(current_entitlement(mine).cloned())
        })
    }

    fn consume(
        &self,
        entitlement_id: EntitlementId,
        booking_id: BookingId,
    ) -> BoxFuture<'_, Result<Entitlement, EntitlementError>> {
        Box::pin(async move {
            let mut entitlements = self.entitlements.write().unwrap();
            let entitlement = entitlements
                .get_mut(&entitlement_id)
                .ok_or(EntitlementError::NotFound(entitlement_id))?;
            if entitlement.booking_used {
                return Err(EntitlementError::AlreadyConsumed(entitlement_id));
            }
            entitlement.booking_used = true;
            entitlement.booking_id = Some(booking_id);
            Ok(entitlement.clone())
        })
    }
}

// ============================================================================
// Discounts and campaigns
// ============================================================================

/// In-memory [`DiscountCatalog`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryDiscountCatalog {
    discounts: Arc<RwLock<Vec<Discount>>>,
    campaigns: Arc<RwLock<Vec<Campaign>>>,
}

impl InMemoryDiscountCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a standing discount
    pub fn add_discount(&self, discount: Discount) {
        self.discounts.write().unwrap().push(discount);
    }

    /// Add a campaign
    pub fn add_campaign(&self, campaign: Campaign) {
        self.campaigns.write().unwrap().push(campaign);
    }
}

impl DiscountCatalog for InMemoryDiscountCatalog {
    fn discounts_for_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Vec<Discount>, StoreError>> {
        Box::pin(async move {
            let mut found: Vec<Discount> = self
                .discounts
                .read()
                .unwrap()
                .iter()
                .filter(|d| d.package_id == package_id)
                .cloned()
                .collect();
            found.sort_by_key(|d| d.id);
            Ok(found)
        })
    }

    fn campaigns_for_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Vec<Campaign>, StoreError>> {
        Box::pin(async move {
            let mut found: Vec<Campaign> = self
                .campaigns
                .read()
                .unwrap()
                .iter()
                .filter(|c| c.package_id == package_id)
                .cloned()
                .collect();
            found.sort_by_key(|c| c.id);
            Ok(found)
        })
    }
}

// ============================================================================
// Packages
// ============================================================================

/// In-memory [`PackageStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryPackageStore {
    packages: Arc<RwLock<HashMap<PackageId, Package>>>,
}

impl InMemoryPackageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a package
    pub fn add(&self, package: Package) {
        self.packages.write().unwrap().insert(package.id, package);
    }
}

impl PackageStore for InMemoryPackageStore {
    fn get(&self, package_id: PackageId) -> BoxFuture<'_, Result<Option<Package>, StoreError>> {
        Box::pin(async move { Ok(self.packages.read().unwrap().get(&package_id).cloned()) })
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// In-memory [`BookingStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored booking, for assertions
    #[must_use]
    pub fn all(&self) -> Vec<Booking> {
        self.bookings.read().unwrap().values().cloned().collect()
    }

    /// Number of stored bookings
    #[must_use]
    pub fn len(&self) -> usize {
        self.bookings.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookings.read().unwrap().is_empty()
    }
}

impl BookingStore for InMemoryBookingStore {
    fn insert(&self, booking: Booking) -> BoxFuture<'_, Result<(), BookingStoreError>> {
        Box::pin(async move {
            let mut bookings = self.bookings.write().unwrap();
            if bookings.contains_key(&booking.id) {
                return Err(StoreError::Conflict(format!("booking {} exists", booking.id)).into());
            }
            bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn get(&self, booking_id: BookingId) -> BoxFuture<'_, Result<Booking, BookingStoreError>> {
        Box::pin(async move {
            self.bookings
                .read()
                .unwrap()
                .get(&booking_id)
                .cloned()
                .ok_or(BookingStoreError::NotFound(booking_id))
        })
    }

    fn remove(&self, booking_id: BookingId) -> BoxFuture<'_, Result<(), BookingStoreError>> {
        Box::pin(async move {
            self.bookings
                .write()
                .unwrap()
                .remove(&booking_id)
                .map(|_| ())
                .ok_or(BookingStoreError::NotFound(booking_id))
        })
    }

    fn transition(
        &self,
        booking_id: BookingId,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Booking, BookingStoreError>> {
        Box::pin(async move {
            let mut bookings = self.bookings.write().unwrap();
            let booking = bookings
                .get_mut(&booking_id)
                .ok_or(BookingStoreError::NotFound(booking_id))?;
            if !booking.status.can_transition_to(to) {
                return Err(BookingStoreError::InvalidTransition {
                    from: booking.status,
                    to,
                });
            }
            booking.status = to;
            if to == BookingStatus::Cancelled {
                booking.seat_hold = SeatHold::Releasing;
            }
            booking.updated_at = at;
            Ok(booking.clone())
        })
    }

    fn swap_seat_hold(
        &self,
        booking_id: BookingId,
        expected: SeatHold,
        next: SeatHold,
    ) -> BoxFuture<'_, Result<Option<Booking>, BookingStoreError>> {
        Box::pin(async move {
            let mut bookings = self.bookings.write().unwrap();
            let booking = bookings
                .get_mut(&booking_id)
                .ok_or(BookingStoreError::NotFound(booking_id))?;
            if booking.seat_hold != expected {
                return Ok(None);
            }
            booking.seat_hold = next;
            Ok(Some(booking.clone()))
        })
    }
}

// ============================================================================
// Identity
// ============================================================================

/// In-memory [`IdentityProvider`]: every user is active unless deactivated.
#[derive(Clone, Debug, Default)]
pub struct InMemoryIdentityProvider {
    inactive: Arc<RwLock<HashSet<UserId>>>,
}

impl InMemoryIdentityProvider {
    /// Create a provider where everyone is active
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user inactive
    pub fn deactivate(&self, user_id: UserId) {
        self.inactive.write().unwrap().insert(user_id);
    }
}

impl IdentityProvider for InMemoryIdentityProvider {
    fn is_active(&self, user_id: UserId) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move { Ok(!self.inactive.read().unwrap().contains(&user_id)) })
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// [`Notifier`] that records every delivered event.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    delivered: Arc<RwLock<Vec<BookingNotification>>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Create a notifier that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier that records and then reports a delivery failure
    #[must_use]
    pub fn failing() -> Self {
        Self {
            delivered: Arc::default(),
            fail: true,
        }
    }

    /// Events delivered so far
    #[must_use]
    pub fn notifications(&self) -> Vec<BookingNotification> {
        self.delivered.read().unwrap().clone()
    }

    /// Wait until at least `count` events arrived or a second passed.
    ///
    /// Notifications are dispatched from spawned tasks, so tests poll.
    pub async fn wait_for(&self, count: usize) -> Vec<BookingNotification> {
        for _ in 0..100 {
            if self.delivered.read().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifications()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: BookingNotification) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(async move {
            self.delivered.write().unwrap().push(notification);
            if self.fail {
                return Err(NotifyError("mail relay refused the message".to_string()));
            }
            Ok(())
        })
    }
}
