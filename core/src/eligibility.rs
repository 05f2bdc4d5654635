//! The tier gate decision.

use crate::entitlement::Entitlement;
use crate::types::EntitlementId;
use serde::{Deserialize, Serialize};

/// Outcome of checking whether a user may book a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Eligibility {
    /// The package is not tier-gated
    Open,
    /// Tier-gated, and this entitlement satisfies the gate
    Entitled {
        /// Entitlement the booking will consume
        entitlement_id: EntitlementId,
    },
    /// Tier-gated and the user holds no unconsumed entitlement
    NoEntitlement,
    /// Tier-gated and the user's entitlement ranks too low
    TierTooLow {
        /// Rank the package requires
        required: i32,
        /// Rank the user holds
        held: i32,
    },
    /// The identity provider reports the user as inactive
    InactiveUser,
}

impl Eligibility {
    /// Whether the booking may proceed.
    #[must_use]
    pub const fn can_book(&self) -> bool {
        matches!(self, Self::Open | Self::Entitled { .. })
    }

    /// Entitlement to consume when the booking is confirmed.
    #[must_use]
    pub const fn entitlement_to_consume(&self) -> Option<EntitlementId> {
        match self {
            Self::Entitled { entitlement_id } => Some(*entitlement_id),
            _ => None,
        }
    }
}

/// Decides eligibility for an active user from the package's tier
/// requirement and the user's current entitlement.
///
/// Equal `sort_order` counts as equal rank, so it satisfies the gate.
#[must_use]
pub fn decide(min_tier_sort_order: Option<i32>, current: Option<&Entitlement>) -> Eligibility {
    let Some(required) = min_tier_sort_order else {
        return Eligibility::Open;
    };
    match current {
        None => Eligibility::NoEntitlement,
        Some(e) if e.booking_used => Eligibility::NoEntitlement,
        Some(e) if e.tier_sort_order >= required => Eligibility::Entitled {
            entitlement_id: e.id,
        },
        Some(e) => Eligibility::TierTooLow {
            required,
            held: e.tier_sort_order,
        },
    }
}
