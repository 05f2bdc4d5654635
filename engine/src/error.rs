//! Booking errors and what the caller should do about them.

use serde::{Deserialize, Serialize};
use skyslot_core::{
    BookingStatus, BookingStoreError, CouponError, Eligibility, EntitlementError, PricingError,
    SlotError, SlotId, StoreError,
};
use thiserror::Error;

/// Every way a booking operation can fail.
///
/// The variants keep the user-facing categories apart: fix the input, the
/// world changed, not entitled, or try again later. See
/// [`BookingError::remediation`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed request; nothing happened.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The tier gate refused the user.
    #[error("Not eligible to book: {0:?}")]
    Ineligible(Eligibility),

    /// The slot is closed or cannot take the party any more.
    #[error("Slot unavailable: {0}")]
    SlotUnavailable(SlotError),

    /// Lost the race for the last seats while reserving.
    #[error("Slot {slot_id} is full: requested {requested}, available {available}")]
    SlotFull {
        /// The contested slot
        slot_id: SlotId,
        /// Seats requested
        requested: u32,
        /// Seats free when the reservation was refused
        available: u32,
    },

    /// The slot still holds seats.
    #[error("Slot {slot_id} still holds {occupied} seats")]
    SlotInUse {
        /// The slot
        slot_id: SlotId,
        /// Seats held
        occupied: u32,
    },

    /// The coupon cannot be redeemed.
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(CouponError),

    /// A store failed. Nothing is held when this is returned from a booking
    /// attempt.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// The request deadline passed. Nothing is held.
    #[error("Booking request timed out")]
    Timeout,

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The booking is not in a state that allows the change.
    #[error("Booking cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: BookingStatus,
        /// Requested status
        to: BookingStatus,
    },

    /// Undoing or releasing a held resource failed after retries; the
    /// resource stays held until reconciled.
    #[error("Failed to {step}: {cause}")]
    CompensationFailed {
        /// The step that failed
        step: &'static str,
        /// Last error seen
        cause: String,
    },
}

/// The remedy a caller should offer the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    /// Correct the request and resubmit
    FixInput,
    /// Show a refreshed list of slots
    RefreshAvailability,
    /// Point the user at acquiring a support entitlement
    AcquireEntitlement,
    /// Retry the whole request later
    RetryLater,
    /// Nothing the user can do; escalate
    None,
}

impl Remediation {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FixInput => "fix_input",
            Self::RefreshAvailability => "refresh_availability",
            Self::AcquireEntitlement => "acquire_entitlement",
            Self::RetryLater => "retry_later",
            Self::None => "none",
        }
    }
}

impl BookingError {
    /// What the caller should offer the user.
    #[must_use]
    pub const fn remediation(&self) -> Remediation {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidCoupon(_)
            | Self::NotFound(_)
            | Self::InvalidTransition { .. } => Remediation::FixInput,
            Self::Ineligible(Eligibility::InactiveUser) => Remediation::None,
            Self::Ineligible(_) => Remediation::AcquireEntitlement,
            Self::SlotUnavailable(_) | Self::SlotFull { .. } => Remediation::RefreshAvailability,
            Self::StoreUnavailable(StoreError::Unavailable(_)) | Self::Timeout => {
                Remediation::RetryLater
            }
            Self::StoreUnavailable(_) | Self::SlotInUse { .. } | Self::CompensationFailed { .. } => {
                Remediation::None
            }
        }
    }

    /// Whether resubmitting the same request may succeed.
    ///
    /// Capacity races are deliberately excluded: the user may need to pick
    /// another slot.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.remediation(), Remediation::RetryLater)
    }

    /// Metric label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Ineligible(_) => "ineligible",
            Self::SlotUnavailable(_) => "slot_unavailable",
            Self::SlotFull { .. } => "slot_full",
            Self::SlotInUse { .. } => "slot_in_use",
            Self::InvalidCoupon(_) => "invalid_coupon",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Timeout => "timeout",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::CompensationFailed { .. } => "compensation_failed",
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error)
    }
}

impl From<SlotError> for BookingError {
    fn from(error: SlotError) -> Self {
        match error {
            SlotError::NotFound(slot_id) => Self::NotFound(format!("slot {slot_id}")),
            SlotError::Full {
                slot_id,
                requested,
                available,
            } => Self::SlotFull {
                slot_id,
                requested,
                available,
            },
            SlotError::InUse { slot_id, occupied } => Self::SlotInUse { slot_id, occupied },
            SlotError::Closed(_) => Self::SlotUnavailable(error),
            SlotError::InvalidPassengerCount(_) | SlotError::ReleaseExceedsOccupancy { .. } => {
                Self::InvalidInput(error.to_string())
            }
            SlotError::Store(store) => Self::StoreUnavailable(store),
        }
    }
}

impl From<CouponError> for BookingError {
    fn from(error: CouponError) -> Self {
        match error {
            CouponError::Store(store) => Self::StoreUnavailable(store),
            other => Self::InvalidCoupon(other),
        }
    }
}

impl From<EntitlementError> for BookingError {
    fn from(error: EntitlementError) -> Self {
        match error {
            EntitlementError::NotFound(id) => Self::NotFound(format!("entitlement {id}")),
            // Spent by a concurrent booking between the gate and consumption.
            EntitlementError::AlreadyConsumed(_) => Self::Ineligible(Eligibility::NoEntitlement),
            EntitlementError::NoMatchingTier(_) => Self::InvalidInput(error.to_string()),
            EntitlementError::Store(store) => Self::StoreUnavailable(store),
        }
    }
}

impl From<BookingStoreError> for BookingError {
    fn from(error: BookingStoreError) -> Self {
        match error {
            BookingStoreError::NotFound(id) => Self::NotFound(format!("booking {id}")),
            BookingStoreError::InvalidTransition { from, to } => {
                Self::InvalidTransition { from, to }
            }
            BookingStoreError::Store(store) => Self::StoreUnavailable(store),
        }
    }
}

impl From<PricingError> for BookingError {
    fn from(error: PricingError) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

/// Failures while starting the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database connection failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The metrics exporter could not be installed
    #[error("Metrics error: {0}")]
    Metrics(#[from] crate::metrics::MetricsError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_distinct_remediations() {
        assert_eq!(
            BookingError::InvalidInput("no passengers".into()).remediation(),
            Remediation::FixInput
        );
        assert_eq!(
            BookingError::InvalidCoupon(CouponError::Expired).remediation(),
            Remediation::FixInput
        );
        assert_eq!(
            BookingError::Ineligible(Eligibility::NoEntitlement).remediation(),
            Remediation::AcquireEntitlement
        );
        assert_eq!(
            BookingError::SlotFull {
                slot_id: SlotId::new(),
                requested: 1,
                available: 0
            }
            .remediation(),
            Remediation::RefreshAvailability
        );
        assert_eq!(BookingError::Timeout.remediation(), Remediation::RetryLater);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(BookingError::StoreUnavailable(StoreError::Unavailable("down".into())).is_retryable());
        assert!(BookingError::Timeout.is_retryable());
        assert!(!BookingError::StoreUnavailable(StoreError::Corrupt("bad row".into())).is_retryable());
        assert!(
            !BookingError::SlotFull {
                slot_id: SlotId::new(),
                requested: 2,
                available: 1
            }
            .is_retryable()
        );
    }

    #[test]
    fn slot_errors_keep_their_category() {
        let slot_id = SlotId::new();
        assert!(matches!(
            BookingError::from(SlotError::Closed(slot_id)),
            BookingError::SlotUnavailable(SlotError::Closed(_))
        ));
        assert!(matches!(
            BookingError::from(SlotError::Full {
                slot_id,
                requested: 1,
                available: 0
            }),
            BookingError::SlotFull { .. }
        ));
        assert!(matches!(
            BookingError::from(SlotError::Store(StoreError::Unavailable("x".into()))),
            BookingError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn coupon_store_failure_is_not_an_invalid_coupon() {
        assert!(matches!(
            BookingError::from(CouponError::Store(StoreError::Unavailable("x".into()))),
            BookingError::StoreUnavailable(_)
        ));
        assert_eq!(
            BookingError::from(CouponError::LimitReached),
            BookingError::InvalidCoupon(CouponError::LimitReached)
        );
    }
}
