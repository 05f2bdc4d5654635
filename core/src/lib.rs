//! # Skyslot Core
//!
//! Domain types, pure rules and storage contracts for the Skyslot
//! reservation and pricing engine.
//!
//! ## Core Concepts
//!
//! - **Slot**: a capacity-limited time slot an operator flies
//! - **Package**: what is sold; carries the base price and an optional tier gate
//! - **Entitlement**: a single-use credit earned by a support contribution
//! - **Coupon / Discount / Campaign**: the three independent reduction mechanisms
//! - **`PriceBreakdown`**: the itemized trail from subtotal to final price
//!
//! ## Architecture Principles
//!
//! - Pure rules (pricing, eligibility, slot transitions) live here with no I/O
//! - Every store is a dyn-compatible trait; backends live in other crates
//! - Contended counters only change through atomic conditional operations
//!
//! ## Example
//!
//! ```
//! use skyslot_core::pricing::{PriceInput, compute_price};
//! use skyslot_core::types::Money;
//! use chrono::{NaiveDate, Utc};
//!
//! let input = PriceInput {
//!     base_price: Money::from_minor(50_000),
//!     passenger_count: 2,
//!     max_passengers: 4,
//!     slot_date: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap_or_default(),
//!     purchased_at: Utc::now(),
//!     discounts: &[],
//!     campaigns: &[],
//!     coupon: None,
//! };
//! let breakdown = compute_price(&input);
//! assert_eq!(breakdown.map(|b| b.final_price), Ok(Money::from_minor(100_000)));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub mod booking;
pub mod coupon;
pub mod discount;
pub mod eligibility;
pub mod entitlement;
pub mod error;
pub mod pricing;
pub mod slot;
pub mod store;
pub mod types;

/// Environment module - injected dependencies
///
/// Anything the engine needs from the outside world that is not a store.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Campaign windows, coupon expiry and booking timestamps all read the
    /// clock, so tests pin it with a fixed implementation.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use booking::{
    Booking, BookingNotification, BookingStatus, Package, PassengerDetails, SeatHold,
};
pub use coupon::Coupon;
pub use discount::{Campaign, Discount, DiscountCondition, DiscountValue};
pub use eligibility::Eligibility;
pub use entitlement::{Entitlement, SupportTier};
pub use error::{
    BookingStoreError, CouponError, EntitlementError, NotifyError, PricingError, SlotError,
    StoreError,
};
pub use pricing::{AdjustmentSource, AppliedAdjustment, PriceBreakdown};
pub use slot::{SlotStatus, TimeSlot};
pub use types::{
    BookingId, CampaignId, CouponId, DiscountId, EntitlementId, Money, OperatorId, PackageId,
    Percentage, SlotId, TierId, UserId,
};
