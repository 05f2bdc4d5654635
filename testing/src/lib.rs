//! # Skyslot Testing
//!
//! Testing utilities for the Skyslot engine.
//!
//! This crate provides:
//! - In-memory implementations of every store trait ([`memory`])
//! - Store wrappers that inject failures and latency ([`faults`])
//! - Record fixtures for the common scenarios ([`fixtures`])
//! - Proptest strategies for domain values ([`properties`])
//! - A fixed clock and a tracing initializer for tests
//!
//! ## Example
//!
//! ```
//! use skyslot_testing::{InMemorySlotStore, fixtures};
//! use skyslot_core::store::SlotStore;
//! use skyslot_core::OperatorId;
//!
//! # tokio_test::block_on(async {
//! let slots = InMemorySlotStore::new();
//! let slot = fixtures::slot(OperatorId::new(), fixtures::tuesday(), 1);
//! slots.insert(slot.clone()).await.unwrap();
//!
//! assert!(slots.reserve(slot.id, 1).await.is_ok());
//! assert!(slots.reserve(slot.id, 1).await.is_err());
//! # });
//! ```

use chrono::{DateTime, Utc};
use skyslot_core::environment::Clock;

pub mod faults;
pub mod fixtures;
pub mod memory;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::set`] or
    /// [`FixedClock::advance`]. Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use skyslot_testing::mocks::FixedClock;
    /// use skyslot_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now() - time1, Duration::hours(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock to `time`
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap() = time;
        }

        /// Move the clock forward by `by`
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-05-20 10:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-05-20T10:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::Weekday;
    use proptest::prelude::*;
    use skyslot_core::{DiscountCondition, DiscountValue, Money, Percentage};

    /// Positive per-passenger prices up to 1,000,000.00.
    pub fn base_price() -> impl Strategy<Value = Money> {
        (1_i64..=100_000_000).prop_map(Money::from_minor)
    }

    /// Any percentage from 0% to 100%.
    pub fn percentage() -> impl Strategy<Value = Percentage> {
        (0_u32..=Percentage::MAX_BASIS_POINTS).prop_filter_map("in range", Percentage::from_basis_points)
    }

    /// Percentage or non-negative fixed-amount reductions.
    pub fn discount_value() -> impl Strategy<Value = DiscountValue> {
        prop_oneof![
            percentage().prop_map(DiscountValue::Percentage),
            (0_i64..=50_000_000).prop_map(|m| DiscountValue::FixedAmount(Money::from_minor(m))),
        ]
    }

    /// Any discount condition.
    pub fn discount_condition() -> impl Strategy<Value = DiscountCondition> {
        let day = prop_oneof![
            Just(Weekday::Mon),
            Just(Weekday::Tue),
            Just(Weekday::Wed),
            Just(Weekday::Thu),
            Just(Weekday::Fri),
            Just(Weekday::Sat),
            Just(Weekday::Sun),
        ];
        prop_oneof![
            Just(DiscountCondition::Always),
            Just(DiscountCondition::Weekday),
            Just(DiscountCondition::Weekend),
            proptest::collection::vec(day, 1..4).prop_map(DiscountCondition::Days),
        ]
    }
}

/// Installs a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs. The filter
/// comes from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use faults::{FaultOp, Faults};
pub use memory::{
    InMemoryBookingStore, InMemoryCouponLedger, InMemoryDiscountCatalog, InMemoryEntitlementStore,
    InMemoryIdentityProvider, InMemoryPackageStore, InMemorySlotStore, RecordingNotifier,
};
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn clones_share_time() {
        let clock = test_clock();
        let other = clock.clone();
        clock.advance(Duration::minutes(5));
        assert_eq!(other.now(), clock.now());
    }
}
