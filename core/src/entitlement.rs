//! Support tiers and the single-use entitlements they grant.

use crate::types::{BookingId, EntitlementId, Money, OperatorId, TierId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contribution band an operator rewards with booking access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTier {
    /// Tier id
    pub id: TierId,
    /// Operator who defines the tier
    pub operator_id: OperatorId,
    /// Display name
    pub name: String,
    /// Inclusive lower bound of the contribution
    pub min_amount: Money,
    /// Inclusive upper bound; `None` is open-ended
    pub max_amount: Option<Money>,
    /// Rank; higher is more privileged, equal values are equal rank
    pub sort_order: i32,
}

impl SupportTier {
    /// Whether `amount` falls inside this tier's band.
    #[must_use]
    pub fn covers(&self, amount: Money) -> bool {
        amount >= self.min_amount && self.max_amount.is_none_or(|max| amount <= max)
    }
}

/// Picks the tier a contribution earns.
///
/// When bands overlap the highest `sort_order` wins; remaining ties go to the
/// lowest tier id so the result does not depend on input order.
#[must_use]
pub fn resolve_tier(tiers: &[SupportTier], amount: Money) -> Option<&SupportTier> {
    tiers
        .iter()
        .filter(|tier| tier.covers(amount))
        .max_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| b.id.cmp(&a.id)))
}

/// A recorded contribution that permits one tier-gated booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// Entitlement id
    pub id: EntitlementId,
    /// Holder
    pub user_id: UserId,
    /// Operator whose tier was granted; the entitlement only counts there
    pub operator_id: OperatorId,
    /// Tier granted
    pub tier_id: TierId,
    /// Tier rank at grant time
    pub tier_sort_order: i32,
    /// Set once a booking has spent the entitlement; never cleared
    pub booking_used: bool,
    /// Booking that spent it
    pub booking_id: Option<BookingId>,
    /// Grant instant; the newest unconsumed entitlement is the current one
    pub granted_at: DateTime<Utc>,
}

impl Entitlement {
    /// Records a fresh, unconsumed entitlement for `tier`.
    #[must_use]
    pub fn grant(user_id: UserId, tier: &SupportTier, granted_at: DateTime<Utc>) -> Self {
        Self {
            id: EntitlementId::new(),
            user_id,
            operator_id: tier.operator_id,
            tier_id: tier.id,
            tier_sort_order: tier.sort_order,
            booking_used: false,
            booking_id: None,
            granted_at,
        }
    }

    /// Whether the entitlement can still be spent.
    #[must_use]
    pub const fn is_unconsumed(&self) -> bool {
        !self.booking_used
    }
}

/// The newest unconsumed entitlement in `entitlements`, by grant time.
///
/// Identical grant instants fall back to the larger id.
#[must_use]
pub fn current_entitlement<'a, I>(entitlements: I) -> Option<&'a Entitlement>
where
    I: IntoIterator<Item = &'a Entitlement>,
{
    entitlements
        .into_iter()
        .filter(|e| e.is_unconsumed())
        .max_by(|a, b| a.granted_at.cmp(&b.granted_at).then_with(|| a.id.cmp(&b.id)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tier(name: &str, min: i64, max: Option<i64>, sort_order: i32) -> SupportTier {
        SupportTier {
            id: TierId::new(),
            operator_id: OperatorId::new(),
            name: name.to_string(),
            min_amount: Money::from_minor(min),
            max_amount: max.map(Money::from_minor),
            sort_order,
        }
    }

    #[test]
    fn contribution_resolves_to_matching_band() {
        let tiers = vec![
            tier("bronze", 1_000, Some(4_999), 1),
            tier("silver", 5_000, Some(9_999), 2),
            tier("gold", 10_000, None, 3),
        ];
        assert_eq!(resolve_tier(&tiers, Money::from_minor(5_000)).unwrap().name, "silver");
        assert_eq!(resolve_tier(&tiers, Money::from_minor(4_999)).unwrap().name, "bronze");
        assert_eq!(resolve_tier(&tiers, Money::from_minor(1_000_000)).unwrap().name, "gold");
        assert!(resolve_tier(&tiers, Money::from_minor(999)).is_none());
    }

    #[test]
    fn overlapping_bands_prefer_higher_rank() {
        let tiers = vec![tier("base", 0, None, 1), tier("patron", 2_000, None, 5)];
        assert_eq!(resolve_tier(&tiers, Money::from_minor(2_500)).unwrap().name, "patron");
        assert_eq!(resolve_tier(&tiers, Money::from_minor(100)).unwrap().name, "base");
    }

    #[test]
    fn newest_unconsumed_entitlement_is_current() {
        let user = UserId::new();
        let t = tier("gold", 0, None, 3);
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let older = Entitlement::grant(user, &t, t0);
        let newer = Entitlement::grant(user, &t, t0 + Duration::days(1));
        let mut newest_spent = Entitlement::grant(user, &t, t0 + Duration::days(2));
        newest_spent.booking_used = true;

        let all = [older.clone(), newer.clone(), newest_spent];
        assert_eq!(current_entitlement(&all).unwrap().id, newer.id);
        assert!(current_entitlement(&all[2..]).is_none());
    }
}
