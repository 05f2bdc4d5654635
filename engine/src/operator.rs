//! Operator-side actions: the slot schedule and entitlement grants.

use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::retry::{RetryPolicy, retry_transient};
use skyslot_core::entitlement::resolve_tier;
use skyslot_core::{
    Entitlement, EntitlementError, Money, NaiveDate, NaiveTime, OperatorId, PackageId, SlotId,
    SlotStatus, TimeSlot, UserId,
};

/// Slot scheduling, availability and entitlement grants.
#[derive(Clone)]
pub struct OperatorActions {
    env: BookingEnvironment,
    retry: RetryPolicy,
}

/// What to schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSchedule {
    /// Operator flying the slot
    pub operator_id: OperatorId,
    /// Calendar date
    pub date: NaiveDate,
    /// Departure time
    pub start_time: NaiveTime,
    /// Length of the flight
    pub duration_minutes: u32,
    /// Seat capacity, at least one
    pub max_passengers: u32,
    /// Package the slot is sold under; `None` sells any of the operator's
    pub package_id: Option<PackageId>,
}

impl OperatorActions {
    /// Create the operator actions over `env`.
    #[must_use]
    pub const fn new(env: BookingEnvironment, retry: RetryPolicy) -> Self {
        Self { env, retry }
    }

    /// Creates an empty, available slot.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidInput`] for a zero capacity, or a store failure.
    #[tracing::instrument(skip(self, schedule), fields(operator_id = %schedule.operator_id, date = %schedule.date))]
    pub async fn schedule_slot(&self, schedule: SlotSchedule) -> Result<TimeSlot, BookingError> {
        let slot = TimeSlot::schedule(
            schedule.operator_id,
            schedule.date,
            schedule.start_time,
            schedule.duration_minutes,
            schedule.max_passengers,
            schedule.package_id,
        )?;
        self.env.slots.insert(slot.clone()).await?;
        tracing::info!(slot_id = %slot.id, max_passengers = slot.max_passengers, "Slot scheduled");
        Ok(slot)
    }

    /// Stops further reservations on a slot. Held seats stay held.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] or a store failure.
    pub async fn close_slot(&self, slot_id: SlotId) -> Result<TimeSlot, BookingError> {
        let slot = self.env.slots.set_closed(slot_id, true).await?;
        tracing::info!(%slot_id, "Slot closed");
        Ok(slot)
    }

    /// Lifts the closed override; the status follows occupancy again.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] or a store failure.
    pub async fn reopen_slot(&self, slot_id: SlotId) -> Result<TimeSlot, BookingError> {
        let slot = self.env.slots.set_closed(slot_id, false).await?;
        tracing::info!(%slot_id, status = %slot.status, "Slot reopened");
        Ok(slot)
    }

    /// Deletes a slot that holds no seats.
    ///
    /// # Errors
    ///
    /// [`BookingError::SlotInUse`] while seats are held,
    /// [`BookingError::NotFound`] or a store failure.
    pub async fn delete_slot(&self, slot_id: SlotId) -> Result<(), BookingError> {
        self.env.slots.delete(slot_id).await?;
        tracing::info!(%slot_id, "Slot deleted");
        Ok(())
    }

    /// Slots on `date` that can still take a passenger on `package_id`,
    /// ordered by start time.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown package, or a store failure.
    pub async fn available_slots(
        &self,
        package_id: PackageId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        let package = retry_transient(&self.retry, || self.env.packages.get(package_id))
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("package {package_id}")))?;
        let slots = retry_transient(&self.retry, || {
            self.env.slots.slots_on(package.operator_id, date)
        })
        .await?;
        Ok(slots
            .into_iter()
            .filter(|slot| {
                slot.status != SlotStatus::Closed
                    && slot.available_seats() > 0
                    && slot.package_id.is_none_or(|id| id == package_id)
            })
            .collect())
    }

    /// Records a support contribution as an unconsumed entitlement.
    ///
    /// The operator's tier whose band contains `contribution` is granted;
    /// on overlapping bands the highest rank wins.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidInput`] when no tier covers the amount, or a
    /// store failure.
    #[tracing::instrument(skip(self))]
    pub async fn grant_entitlement(
        &self,
        user_id: UserId,
        operator_id: OperatorId,
        contribution: Money,
    ) -> Result<Entitlement, BookingError> {
        let tiers = retry_transient(&self.retry, || {
            self.env.entitlements.tiers_for_operator(operator_id)
        })
        .await?;
        let tier = resolve_tier(&tiers, contribution)
            .ok_or(EntitlementError::NoMatchingTier(contribution.minor()))?;
        let entitlement = Entitlement::grant(user_id, tier, self.env.clock.now());
        self.env.entitlements.insert(entitlement.clone()).await?;
        tracing::info!(
            entitlement_id = %entitlement.id,
            tier = %tier.name,
            rank = tier.sort_order,
            "Entitlement granted"
        );
        Ok(entitlement)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::environment::InMemoryBackend;
    use skyslot_core::store::SlotStore;
    use skyslot_testing::{fixtures, test_clock};
    use std::sync::Arc;

    fn actions(backend: &InMemoryBackend) -> OperatorActions {
        OperatorActions::new(
            backend.environment(Arc::new(test_clock())),
            RetryPolicy::none(),
        )
    }

    fn schedule(operator_id: OperatorId, max_passengers: u32) -> SlotSchedule {
        SlotSchedule {
            operator_id,
            date: fixtures::tuesday(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            max_passengers,
            package_id: None,
        }
    }

    #[tokio::test]
    async fn scheduled_slot_starts_empty_and_available() {
        let backend = InMemoryBackend::new();
        let slot = actions(&backend)
            .schedule_slot(schedule(OperatorId::new(), 4))
            .await
            .unwrap();
        assert_eq!(slot.status, SlotStatus::Available);
        assert_eq!(slot.current_passengers, 0);
        assert!(backend.slots.snapshot(slot.id).is_some());
    }

    #[tokio::test]
    async fn zero_capacity_is_invalid_input() {
        let backend = InMemoryBackend::new();
        let result = actions(&backend)
            .schedule_slot(schedule(OperatorId::new(), 0))
            .await;
        assert!(matches!(result, Err(BookingError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn reopen_restores_booked_when_full() {
        let backend = InMemoryBackend::new();
        let actions = actions(&backend);
        let slot = actions
            .schedule_slot(schedule(OperatorId::new(), 2))
            .await
            .unwrap();
        backend.slots.reserve(slot.id, 2).await.unwrap();

        assert_eq!(actions.close_slot(slot.id).await.unwrap().status, SlotStatus::Closed);
        assert_eq!(actions.reopen_slot(slot.id).await.unwrap().status, SlotStatus::Booked);
    }

    #[tokio::test]
    async fn delete_refused_while_seats_are_held() {
        let backend = InMemoryBackend::new();
        let actions = actions(&backend);
        let slot = actions
            .schedule_slot(schedule(OperatorId::new(), 2))
            .await
            .unwrap();
        backend.slots.reserve(slot.id, 1).await.unwrap();

        let result = actions.delete_slot(slot.id).await;
        assert!(matches!(result, Err(BookingError::SlotInUse { occupied: 1, .. })));

        backend.slots.release(slot.id, 1).await.unwrap();
        actions.delete_slot(slot.id).await.unwrap();
        assert!(backend.slots.snapshot(slot.id).is_none());
    }

    #[tokio::test]
    async fn availability_skips_closed_full_and_foreign_slots() {
        let backend = InMemoryBackend::new();
        let actions = actions(&backend);
        let operator_id = OperatorId::new();
        let package = fixtures::package(operator_id, 10_000, 4);
        backend.packages.add(package.clone());

        let open = actions.schedule_slot(schedule(operator_id, 2)).await.unwrap();
        let full = actions.schedule_slot(schedule(operator_id, 1)).await.unwrap();
        backend.slots.reserve(full.id, 1).await.unwrap();
        let closed = actions.schedule_slot(schedule(operator_id, 2)).await.unwrap();
        actions.close_slot(closed.id).await.unwrap();
        let mut other_package = schedule(operator_id, 2);
        other_package.package_id = Some(PackageId::new());
        actions.schedule_slot(other_package).await.unwrap();

        let available = actions
            .available_slots(package.id, fixtures::tuesday())
            .await
            .unwrap();
        assert_eq!(available.iter().map(|s| s.id).collect::<Vec<_>>(), vec![open.id]);
    }

    #[tokio::test]
    async fn grant_picks_covering_tier() {
        let backend = InMemoryBackend::new();
        let operator_id = OperatorId::new();
        backend
            .entitlements
            .add_tier(fixtures::tier(operator_id, "Bronze", 1_000, Some(4_999), 1));
        backend
            .entitlements
            .add_tier(fixtures::tier(operator_id, "Gold", 5_000, None, 3));
        let actions = actions(&backend);
        let user_id = UserId::new();

        let granted = actions
            .grant_entitlement(user_id, operator_id, Money::from_minor(7_500))
            .await
            .unwrap();
        assert_eq!(granted.tier_sort_order, 3);
        assert!(!granted.booking_used);

        let result = actions
            .grant_entitlement(user_id, operator_id, Money::from_minor(500))
            .await;
        assert!(matches!(result, Err(BookingError::InvalidInput(_))));
    }
}
