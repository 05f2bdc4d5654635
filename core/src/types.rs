//! Identifiers and value objects shared by every part of the engine.
//!
//! Money is carried in integer minor currency units (cents, öre, ...) so no
//! computation ever sees a fractional amount. Percentages are carried in basis
//! points (1/100 of a percent) for the same reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Declares a UUID-backed identifier newtype.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Creates a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an operator (the business selling slots)
    OperatorId
);
define_id!(
    /// Unique identifier for a user of the platform
    UserId
);
define_id!(
    /// Unique identifier for a bookable time slot
    SlotId
);
define_id!(
    /// Unique identifier for a package (what is being sold)
    PackageId
);
define_id!(
    /// Unique identifier for a support tier
    TierId
);
define_id!(
    /// Unique identifier for a recorded support entitlement
    EntitlementId
);
define_id!(
    /// Unique identifier for a coupon
    CouponId
);
define_id!(
    /// Unique identifier for a standing discount
    DiscountId
);
define_id!(
    /// Unique identifier for a campaign
    CampaignId
);
define_id!(
    /// Unique identifier for a booking
    BookingId
);

// ============================================================================
// Money
// ============================================================================

/// An amount of money in minor currency units.
///
/// Signed so that malformed inputs (negative prices) can be represented and
/// rejected at the edges; every amount the pricing engine produces is `>= 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the amount is strictly positive
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Multiplies by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as i64) {
            Some(product) => Some(Self(product)),
            None => None,
        }
    }

    /// Subtracts `other`, clamping the result at zero
    #[must_use]
    pub const fn saturating_sub_to_zero(self, other: Self) -> Self {
        let diff = self.0.saturating_sub(other.0);
        if diff < 0 { Self(0) } else { Self(diff) }
    }

    /// Returns the smaller of two amounts
    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 { self } else { other }
    }

    /// Computes `percentage` of this amount, rounded half-up to the minor unit.
    ///
    /// Negative amounts yield zero: a percentage of nothing is nothing.
    #[must_use]
    pub fn percentage_of(self, percentage: Percentage) -> Self {
        if self.0 <= 0 {
            return Self::ZERO;
        }
        let scaled = i128::from(self.0) * i128::from(percentage.basis_points());
        let rounded = (scaled + 5_000) / 10_000;
        // rounded <= self.0 because basis points are capped at 10_000
        Self(i64::try_from(rounded).unwrap_or(self.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

// ============================================================================
// Percentage
// ============================================================================

/// A percentage in basis points, `0..=10_000` (0% to 100%).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percentage(u32);

impl Percentage {
    /// Largest representable percentage (100%).
    pub const MAX_BASIS_POINTS: u32 = 10_000;

    /// Creates a percentage from basis points, rejecting anything above 100%.
    #[must_use]
    pub const fn from_basis_points(basis_points: u32) -> Option<Self> {
        if basis_points > Self::MAX_BASIS_POINTS {
            None
        } else {
            Some(Self(basis_points))
        }
    }

    /// Creates a percentage from whole percent (e.g. `10` for 10%).
    #[must_use]
    pub const fn from_percent(percent: u32) -> Option<Self> {
        match percent.checked_mul(100) {
            Some(bp) => Self::from_basis_points(bp),
            None => None,
        }
    }

    /// Returns the value in basis points
    #[must_use]
    pub const fn basis_points(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Percentage {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_basis_points(value)
            .ok_or_else(|| format!("percentage out of range: {value} basis points"))
    }
}

impl From<Percentage> for u32 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
