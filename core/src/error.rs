//! Error types for the store contracts and the pure pricing rules.
//!
//! Each store contract has its own error enum so callers can match on the
//! exact refusal (a full slot is not a missing slot). Transport-level failures
//! from any backend are folded into [`StoreError`].

use crate::booking::BookingStatus;
use crate::types::{BookingId, EntitlementId, SlotId};
use thiserror::Error;

/// Persistence failures that are independent of business rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or the operation timed out.
    ///
    /// Safe to retry as long as no capacity is held.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("Store conflict: {0}")]
    Conflict(String),

    /// A persisted row could not be mapped back to a domain record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Refusals from the slot capacity store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// No slot with this id exists.
    #[error("Slot not found: {0}")]
    NotFound(SlotId),

    /// Not enough free seats for the requested passenger count.
    #[error("Slot {slot_id} is full: requested {requested}, available {available}")]
    Full {
        /// The contested slot
        slot_id: SlotId,
        /// Seats requested
        requested: u32,
        /// Seats still free when the request was evaluated
        available: u32,
    },

    /// The operator closed the slot.
    #[error("Slot {0} is closed")]
    Closed(SlotId),

    /// The slot still holds seats and cannot be deleted.
    #[error("Slot {slot_id} still holds {occupied} seats")]
    InUse {
        /// The slot
        slot_id: SlotId,
        /// Seats currently occupied
        occupied: u32,
    },

    /// A release asked for more seats than the slot holds.
    #[error("Slot {slot_id} holds {occupied} seats, cannot release {requested}")]
    ReleaseExceedsOccupancy {
        /// The slot
        slot_id: SlotId,
        /// Seats requested for release
        requested: u32,
        /// Seats currently occupied
        occupied: u32,
    },

    /// Passenger counts and capacities must be at least one.
    #[error("Invalid passenger count: {0}")]
    InvalidPassengerCount(u32),

    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Refusals from the coupon ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// No coupon matches the normalized code.
    #[error("Coupon not found: {0}")]
    NotFound(String),

    /// The coupon's expiry has passed.
    #[error("Coupon has expired")]
    Expired,

    /// The coupon was deactivated.
    #[error("Coupon is inactive")]
    Inactive,

    /// The coupon is bound to a different package.
    #[error("Coupon does not apply to this package")]
    PackageMismatch,

    /// The coupon's usage limit has been reached.
    #[error("Coupon usage limit reached")]
    LimitReached,

    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Refusals from the entitlement store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// No entitlement with this id exists.
    #[error("Entitlement not found: {0}")]
    NotFound(EntitlementId),

    /// The entitlement was already spent on another booking.
    #[error("Entitlement {0} was already consumed")]
    AlreadyConsumed(EntitlementId),

    /// No support tier of the operator covers the contribution amount.
    #[error("No support tier matches a contribution of {0} minor units")]
    NoMatchingTier(i64),

    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Refusals from the booking store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingStoreError {
    /// No booking with this id exists.
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    /// The booking is not in a state that allows the transition.
    #[error("Booking cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// Backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input errors from the pricing rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Base price must be strictly positive.
    #[error("Base price must be positive, got {0}")]
    InvalidBasePrice(i64),

    /// Passenger count outside `1..=max`.
    #[error("Passenger count {requested} outside 1..={max}")]
    InvalidPassengerCount {
        /// Passengers requested
        requested: u32,
        /// Package maximum
        max: u32,
    },

    /// A fixed-amount discount with a negative value.
    #[error("Discount value is invalid: {0}")]
    InvalidDiscount(String),

    /// Arithmetic overflow while computing the subtotal.
    #[error("Price computation overflowed")]
    Overflow,
}

/// Failure reported by a notification dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);
