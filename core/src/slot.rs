//! Time slots and their capacity transitions.
//!
//! The transition functions here are the single definition of what a
//! reservation or release does to a slot. The in-memory store applies them
//! under a lock; the Postgres store expresses the same rules as one
//! conditional `UPDATE`.

use crate::error::SlotError;
use crate::types::{OperatorId, PackageId, SlotId};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Occupancy status of a slot.
///
/// `Booked` mirrors `current_passengers == max_passengers`; `Closed` is an
/// operator override that wins over occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Free seats remain
    Available,
    /// Every seat is taken
    Booked,
    /// Operator closed the slot; no further reservations
    Closed,
}

impl SlotStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Closed => "closed",
        }
    }

    /// Parse status from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "booked" => Some(Self::Booked),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Status implied by occupancy alone.
    #[must_use]
    pub const fn for_occupancy(current: u32, max: u32) -> Self {
        if current >= max { Self::Booked } else { Self::Available }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookable, capacity-limited time slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Slot id
    pub id: SlotId,
    /// Operator who flies the slot
    pub operator_id: OperatorId,
    /// Calendar date of the flight; standing discounts are evaluated on this
    pub date: NaiveDate,
    /// Local start time
    pub start_time: NaiveTime,
    /// Duration in minutes
    pub duration_minutes: u32,
    /// Seat capacity
    pub max_passengers: u32,
    /// Occupied seats
    pub current_passengers: u32,
    /// Occupancy status
    pub status: SlotStatus,
    /// Package this slot is sold under, if restricted to one
    pub package_id: Option<PackageId>,
}

impl TimeSlot {
    /// Schedules a new, empty slot.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InvalidPassengerCount`] when `max_passengers` is zero.
    pub fn schedule(
        operator_id: OperatorId,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: u32,
        max_passengers: u32,
        package_id: Option<PackageId>,
    ) -> Result<Self, SlotError> {
        if max_passengers == 0 {
            return Err(SlotError::InvalidPassengerCount(0));
        }
        Ok(Self {
            id: SlotId::new(),
            operator_id,
            date,
            start_time,
            duration_minutes,
            max_passengers,
            current_passengers: 0,
            status: SlotStatus::Available,
            package_id,
        })
    }

    /// Seats still free.
    #[must_use]
    pub const fn available_seats(&self) -> u32 {
        self.max_passengers.saturating_sub(self.current_passengers)
    }

    /// Whether the slot can take `passengers` more seats right now.
    ///
    /// # Errors
    ///
    /// Returns the refusal the reservation would hit.
    pub fn check_reservable(&self, passengers: u32) -> Result<(), SlotError> {
        if passengers == 0 {
            return Err(SlotError::InvalidPassengerCount(passengers));
        }
        if matches!(self.status, SlotStatus::Closed) {
            return Err(SlotError::Closed(self.id));
        }
        if passengers > self.available_seats() {
            return Err(SlotError::Full {
                slot_id: self.id,
                requested: passengers,
                available: self.available_seats(),
            });
        }
        Ok(())
    }

    /// Occupies `passengers` seats, flipping to `Booked` when the slot fills.
    ///
    /// # Errors
    ///
    /// Same as [`TimeSlot::check_reservable`]; the slot is unchanged on error.
    pub fn apply_reserve(&mut self, passengers: u32) -> Result<(), SlotError> {
        self.check_reservable(passengers)?;
        self.current_passengers += passengers;
        self.status = SlotStatus::for_occupancy(self.current_passengers, self.max_passengers);
        Ok(())
    }

    /// Frees `passengers` seats. A `Booked` slot returns to `Available`;
    /// a `Closed` slot stays closed.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::ReleaseExceedsOccupancy`] rather than underflowing.
    pub fn apply_release(&mut self, passengers: u32) -> Result<(), SlotError> {
        if passengers == 0 {
            return Err(SlotError::InvalidPassengerCount(passengers));
        }
        if passengers > self.current_passengers {
            return Err(SlotError::ReleaseExceedsOccupancy {
                slot_id: self.id,
                requested: passengers,
                occupied: self.current_passengers,
            });
        }
        self.current_passengers -= passengers;
        if self.status != SlotStatus::Closed {
            self.status = SlotStatus::for_occupancy(self.current_passengers, self.max_passengers);
        }
        Ok(())
    }

    /// Operator override: no further reservations.
    pub fn close(&mut self) {
        self.status = SlotStatus::Closed;
    }

    /// Lifts the operator override, restoring the occupancy-derived status.
    pub fn reopen(&mut self) {
        self.status = SlotStatus::for_occupancy(self.current_passengers, self.max_passengers);
    }

    /// Deletion is only allowed while no seats are held.
    ///
    /// Every active booking holds its seats until cancelled, so an empty slot
    /// has no active bookings.
    ///
    /// # Errors
    ///
    /// Returns [`SlotError::InUse`] when seats are still occupied.
    pub fn check_deletable(&self) -> Result<(), SlotError> {
        if self.current_passengers > 0 {
            return Err(SlotError::InUse {
                slot_id: self.id,
                occupied: self.current_passengers,
            });
        }
        Ok(())
    }

    /// Whether the invariant `0 <= current <= max` and the status/occupancy
    /// correspondence hold.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.current_passengers <= self.max_passengers
            && (self.status == SlotStatus::Closed
                || self.status
                    == SlotStatus::for_occupancy(self.current_passengers, self.max_passengers))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn slot(max: u32) -> TimeSlot {
        TimeSlot::schedule(
            OperatorId::new(),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            60,
            max,
            None,
        )
        .unwrap()
    }

    #[test]
    fn reserve_to_capacity_marks_booked() {
        let mut s = slot(3);
        s.apply_reserve(2).unwrap();
        assert_eq!(s.status, SlotStatus::Available);
        s.apply_reserve(1).unwrap();
        assert_eq!(s.status, SlotStatus::Booked);
        assert!(s.is_consistent());
    }

    #[test]
    fn reserve_beyond_capacity_is_full_and_unchanged() {
        let mut s = slot(2);
        s.apply_reserve(1).unwrap();
        let err = s.apply_reserve(2).unwrap_err();
        assert_eq!(
            err,
            SlotError::Full {
                slot_id: s.id,
                requested: 2,
                available: 1
            }
        );
        assert_eq!(s.current_passengers, 1);
    }

    #[test]
    fn closed_slot_rejects_even_with_room() {
        let mut s = slot(4);
        s.close();
        assert_eq!(s.apply_reserve(1).unwrap_err(), SlotError::Closed(s.id));
    }

    #[test]
    fn release_reopens_booked_but_not_closed() {
        let mut s = slot(1);
        s.apply_reserve(1).unwrap();
        s.apply_release(1).unwrap();
        assert_eq!(s.status, SlotStatus::Available);

        s.apply_reserve(1).unwrap();
        s.close();
        s.apply_release(1).unwrap();
        assert_eq!(s.status, SlotStatus::Closed);
        s.reopen();
        assert_eq!(s.status, SlotStatus::Available);
    }

    #[test]
    fn release_never_underflows() {
        let mut s = slot(5);
        s.apply_reserve(2).unwrap();
        assert!(matches!(
            s.apply_release(3),
            Err(SlotError::ReleaseExceedsOccupancy { requested: 3, occupied: 2, .. })
        ));
        assert_eq!(s.current_passengers, 2);
    }

    #[test]
    fn zero_capacity_cannot_be_scheduled() {
        let result = TimeSlot::schedule(
            OperatorId::new(),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            60,
            0,
            None,
        );
        assert_eq!(result.unwrap_err(), SlotError::InvalidPassengerCount(0));
    }

    #[test]
    fn occupied_slot_is_not_deletable() {
        let mut s = slot(2);
        assert!(s.check_deletable().is_ok());
        s.apply_reserve(1).unwrap();
        assert!(matches!(s.check_deletable(), Err(SlotError::InUse { occupied: 1, .. })));
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [SlotStatus::Available, SlotStatus::Booked, SlotStatus::Closed] {
            assert_eq!(SlotStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SlotStatus::parse("gone"), None);
    }
}
