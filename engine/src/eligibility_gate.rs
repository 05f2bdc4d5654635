//! Tier gate: may this user book this package?

use crate::error::BookingError;
use crate::retry::{RetryPolicy, retry_transient};
use skyslot_core::eligibility::decide;
use skyslot_core::store::{EntitlementStore, IdentityProvider};
use skyslot_core::{Eligibility, Package, UserId};
use std::sync::Arc;

/// Decides whether a user may book a package.
///
/// Read-only: consuming the entitlement is the coordinator's job once the
/// seats are held.
#[derive(Clone)]
pub struct EligibilityGate {
    identity: Arc<dyn IdentityProvider>,
    entitlements: Arc<dyn EntitlementStore>,
    retry: RetryPolicy,
}

impl EligibilityGate {
    /// Create a gate.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        entitlements: Arc<dyn EntitlementStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            entitlements,
            retry,
        }
    }

    /// Full decision for `user_id` on `package`.
    ///
    /// Inactive users are refused before the tier is looked at. Ungated
    /// packages never touch the entitlement store. Only entitlements from the
    /// package operator's own tiers count.
    ///
    /// # Errors
    ///
    /// [`BookingError::StoreUnavailable`] when a lookup keeps failing.
    pub async fn check(&self, user_id: UserId, package: &Package) -> Result<Eligibility, BookingError> {
        let active = retry_transient(&self.retry, || self.identity.is_active(user_id)).await?;
        if !active {
            return Ok(Eligibility::InactiveUser);
        }
        let Some(required) = package.min_tier_sort_order else {
            return Ok(Eligibility::Open);
        };
        let current = retry_transient(&self.retry, || {
            self.entitlements
                .current_for_user(user_id, package.operator_id)
        })
        .await?;
        let eligibility = decide(Some(required), current.as_ref());
        tracing::debug!(%user_id, package_id = %package.id, ?eligibility, "Eligibility decided");
        Ok(eligibility)
    }

    /// Whether `user_id` may book `package`.
    ///
    /// # Errors
    ///
    /// As [`EligibilityGate::check`].
    pub async fn can_book(&self, user_id: UserId, package: &Package) -> Result<bool, BookingError> {
        Ok(self.check(user_id, package).await?.can_book())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use skyslot_core::{Entitlement, OperatorId};
    use skyslot_testing::{
        FaultOp, Faults, InMemoryEntitlementStore, InMemoryIdentityProvider, fixtures,
        faults::FaultyEntitlementStore,
    };

    fn gated_package(operator_id: OperatorId, rank: i32) -> Package {
        let mut package = fixtures::package(operator_id, 10_000, 4);
        package.min_tier_sort_order = Some(rank);
        package
    }

    fn gate(identity: &InMemoryIdentityProvider, store: &InMemoryEntitlementStore) -> EligibilityGate {
        EligibilityGate::new(
            Arc::new(identity.clone()),
            Arc::new(store.clone()),
            RetryPolicy::none(),
        )
    }

    #[tokio::test]
    async fn ungated_package_is_open_to_active_users() {
        let identity = InMemoryIdentityProvider::new();
        let store = InMemoryEntitlementStore::new();
        let package = fixtures::package(OperatorId::new(), 10_000, 4);
        let decision = gate(&identity, &store)
            .check(skyslot_core::UserId::new(), &package)
            .await
            .unwrap();
        assert_eq!(decision, Eligibility::Open);
    }

    #[tokio::test]
    async fn inactive_user_is_refused_even_when_ungated() {
        let identity = InMemoryIdentityProvider::new();
        let store = InMemoryEntitlementStore::new();
        let user_id = UserId::new();
        identity.deactivate(user_id);
        let package = fixtures::package(OperatorId::new(), 10_000, 4);
        let gate = gate(&identity, &store);
        assert_eq!(
            gate.check(user_id, &package).await.unwrap(),
            Eligibility::InactiveUser
        );
        assert!(!gate.can_book(user_id, &package).await.unwrap());
    }

    #[tokio::test]
    async fn gated_package_uses_newest_entitlement() {
        let identity = InMemoryIdentityProvider::new();
        let store = InMemoryEntitlementStore::new();
        let user_id = UserId::new();
        let operator_id = OperatorId::new();
        let low = fixtures::tier(operator_id, "Bronze", 0, Some(9_999), 1);
        let high = fixtures::tier(operator_id, "Gold", 10_000, None, 3);
        let at = fixtures::purchase_time();
        store.add(Entitlement::grant(user_id, &high, at));
        store.add(Entitlement::grant(user_id, &low, at + chrono::Duration::hours(1)));

        let decision = gate(&identity, &store)
            .check(user_id, &gated_package(operator_id, 2))
            .await
            .unwrap();
        assert_eq!(decision, Eligibility::TierTooLow { required: 2, held: 1 });
    }

    #[tokio::test]
    async fn equal_rank_passes_the_gate() {
        let identity = InMemoryIdentityProvider::new();
        let store = InMemoryEntitlementStore::new();
        let user_id = UserId::new();
        let tier = fixtures::tier(OperatorId::new(), "Silver", 0, None, 2);
        let entitlement = Entitlement::grant(user_id, &tier, fixtures::purchase_time());
        store.add(entitlement.clone());

        let decision = gate(&identity, &store)
            .check(user_id, &gated_package(tier.operator_id, 2))
            .await
            .unwrap();
        assert_eq!(
            decision,
            Eligibility::Entitled {
                entitlement_id: entitlement.id
            }
        );
    }

    #[tokio::test]
    async fn store_outage_is_reported_not_treated_as_ineligible() {
        let identity = InMemoryIdentityProvider::new();
        let faults = Faults::new();
        faults.fail_next(FaultOp::EntitlementCurrent, 1);
        let store = FaultyEntitlementStore::new(Arc::new(InMemoryEntitlementStore::new()), faults);
        let gate = EligibilityGate::new(Arc::new(identity), Arc::new(store), RetryPolicy::none());

        let result = gate.check(UserId::new(), &gated_package(OperatorId::new(), 1)).await;
        assert!(matches!(result, Err(BookingError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn another_operators_tier_does_not_open_the_gate() {
        let identity = InMemoryIdentityProvider::new();
        let store = InMemoryEntitlementStore::new();
        let user_id = UserId::new();
        let elsewhere = fixtures::tier(OperatorId::new(), "Platinum", 0, None, 9);
        store.add(Entitlement::grant(user_id, &elsewhere, fixtures::purchase_time()));

        let decision = gate(&identity, &store)
            .check(user_id, &gated_package(OperatorId::new(), 1))
            .await
            .unwrap();
        assert_eq!(decision, Eligibility::NoEntitlement);
    }
}
