//! Packages, bookings and passenger details.

use crate::pricing::PriceBreakdown;
use crate::types::{BookingId, CouponId, EntitlementId, Money, OperatorId, PackageId, SlotId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an operator sells: a priced experience with a per-booking passenger cap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package id
    pub id: PackageId,
    /// Operator who owns the package
    pub operator_id: OperatorId,
    /// Display name
    pub name: String,
    /// Price per passenger in minor units
    pub base_price: Money,
    /// Largest passenger count a single booking may carry
    pub max_passengers: u32,
    /// Minimum support-tier rank required to book, if gated
    pub min_tier_sort_order: Option<i32>,
    /// Inactive packages cannot be booked
    pub is_active: bool,
}

/// Lifecycle status of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, waiting for the operator
    Pending,
    /// Confirmed by the operator
    Confirmed,
    /// Cancelled; its seats were released
    Cancelled,
}

impl BookingStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses that still hold slot capacity.
    pub const ACTIVE: [Self; 2] = [Self::Pending, Self::Confirmed];

    /// Whether a booking in this status holds seats.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Statuses a booking may move to `target` from.
    #[must_use]
    pub const fn allowed_sources(target: Self) -> &'static [Self] {
        match target {
            Self::Pending => &[],
            Self::Confirmed => &[Self::Pending],
            Self::Cancelled => &Self::ACTIVE,
        }
    }

    /// Whether `self -> target` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        Self::allowed_sources(target).contains(&self)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a booking's seats still count against its slot.
///
/// Active bookings are `Held`. Cancelling moves the booking to `Releasing`
/// in the same write as the status change, so exactly one caller owns the
/// release. A release that fails puts the booking back to `Held`, and the
/// next cancellation claims it again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatHold {
    /// Seats are counted on the slot
    #[default]
    Held,
    /// A cancellation is giving the seats back
    Releasing,
    /// Seats were returned to the slot
    Released,
}

impl SeatHold {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Releasing => "releasing",
            Self::Released => "released",
        }
    }

    /// Parse from the database string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "held" => Some(Self::Held),
            "releasing" => Some(Self::Releasing),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

/// Details captured for one passenger on a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerDetails {
    /// Full name as it should appear on the manifest
    pub full_name: String,
    /// Optional contact email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Optional contact phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Optional date of birth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    /// Optional body weight in kilograms, used for load planning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<u16>,
}

impl PassengerDetails {
    /// Creates passenger details with only a name.
    #[must_use]
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: None,
            phone: None,
            date_of_birth: None,
            weight_kg: None,
        }
    }

    /// Checks that the record is usable on a manifest.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the record is malformed.
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("passenger name must not be empty".to_string());
        }
        if let Some(email) = &self.email {
            let email = email.trim();
            let well_formed = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !well_formed {
                return Err(format!("passenger email is malformed: {email}"));
            }
        }
        if self.weight_kg == Some(0) {
            return Err("passenger weight must be positive".to_string());
        }
        Ok(())
    }
}

/// A persisted booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Who booked
    pub user_id: UserId,
    /// Slot holding the seats
    pub slot_id: SlotId,
    /// Package booked
    pub package_id: PackageId,
    /// Seats held
    pub passenger_count: u32,
    /// One record per passenger
    pub passengers: Vec<PassengerDetails>,
    /// Final price after every discount
    pub total_price: Money,
    /// Full pricing trail for audit and support
    pub price_breakdown: PriceBreakdown,
    /// Coupon redeemed on this booking
    pub coupon_id: Option<CouponId>,
    /// Entitlement consumed by this booking
    pub entitlement_id: Option<EntitlementId>,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Whether the seats are still counted on the slot
    #[serde(default)]
    pub seat_hold: SeatHold,
    /// Free-form notes from the customer
    pub notes: Option<String>,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle events handed to the notification dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "booking", rename_all = "snake_case")]
pub enum BookingNotification {
    /// A booking reached `pending`
    Created(Booking),
    /// The operator confirmed a booking
    Confirmed(Booking),
    /// A booking was cancelled and its seats released
    Cancelled(Booking),
}

impl BookingNotification {
    /// The booking the event is about.
    #[must_use]
    pub const fn booking(&self) -> &Booking {
        match self {
            Self::Created(b) | Self::Confirmed(b) | Self::Cancelled(b) => b,
        }
    }

    /// Short event name for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Confirmed(_) => "confirmed",
            Self::Cancelled(_) => "cancelled",
        }
    }
}
