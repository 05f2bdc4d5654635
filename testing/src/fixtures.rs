//! Record fixtures.
//!
//! Small constructors for the records most tests need, with sensible
//! defaults that individual tests override field by field.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use chrono::{Duration, NaiveTime, TimeZone};
use skyslot_core::pricing::{Adjustments, PriceBreakdown};
use skyslot_core::{
    Booking, BookingId, BookingStatus, Campaign, CampaignId, Coupon, CouponId, DateTime, Discount,
    DiscountCondition, DiscountId, DiscountValue, Money, NaiveDate, OperatorId, Package, PackageId,
    PassengerDetails, Percentage, SeatHold, SlotId, SupportTier, TierId, TimeSlot, UserId, Utc,
};

/// A Tuesday, the default slot date.
#[must_use]
pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()
}

/// A Saturday.
#[must_use]
pub fn saturday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 7).unwrap()
}

/// The purchase instant [`crate::test_clock`] reports.
#[must_use]
pub fn purchase_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap()
}

/// Whole-percent reduction.
#[must_use]
pub fn percent(p: u32) -> DiscountValue {
    DiscountValue::Percentage(Percentage::from_percent(p).unwrap())
}

/// Flat reduction in minor units.
#[must_use]
pub fn fixed(minor: i64) -> DiscountValue {
    DiscountValue::FixedAmount(Money::from_minor(minor))
}

/// An active, ungated package.
#[must_use]
pub fn package(operator_id: OperatorId, base_price: i64, max_passengers: u32) -> Package {
    Package {
        id: PackageId::new(),
        operator_id,
        name: "Sunrise flight".to_string(),
        base_price: Money::from_minor(base_price),
        max_passengers,
        min_tier_sort_order: None,
        is_active: true,
    }
}

/// An empty 09:30 slot of one hour, sold under any package of the operator.
#[must_use]
pub fn slot(operator_id: OperatorId, date: NaiveDate, max_passengers: u32) -> TimeSlot {
    TimeSlot::schedule(
        operator_id,
        date,
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        60,
        max_passengers,
        None,
    )
    .unwrap()
}

/// An active coupon without expiry or usage limit.
#[must_use]
pub fn coupon(operator_id: OperatorId, code: &str, value: DiscountValue) -> Coupon {
    Coupon {
        id: CouponId::new(),
        operator_id,
        code: code.to_string(),
        value,
        package_id: None,
        expires_at: None,
        usage_limit: None,
        times_used: 0,
        is_active: true,
    }
}

/// An active standing discount.
#[must_use]
pub fn discount(package_id: PackageId, value: DiscountValue, condition: DiscountCondition) -> Discount {
    Discount {
        id: DiscountId::new(),
        package_id,
        value,
        condition,
        is_active: true,
    }
}

/// An active campaign running for a week either side of [`purchase_time`].
#[must_use]
pub fn campaign(package_id: PackageId, value: DiscountValue) -> Campaign {
    Campaign {
        id: CampaignId::new(),
        package_id,
        name: "Early summer".to_string(),
        value,
        starts_at: purchase_time() - Duration::days(7),
        ends_at: purchase_time() + Duration::days(7),
        is_active: true,
    }
}

/// A support tier.
#[must_use]
pub fn tier(
    operator_id: OperatorId,
    name: &str,
    min_amount: i64,
    max_amount: Option<i64>,
    sort_order: i32,
) -> SupportTier {
    SupportTier {
        id: TierId::new(),
        operator_id,
        name: name.to_string(),
        min_amount: Money::from_minor(min_amount),
        max_amount: max_amount.map(Money::from_minor),
        sort_order,
    }
}

/// `count` well-formed passengers.
#[must_use]
pub fn passengers(count: u32) -> Vec<PassengerDetails> {
    (1..=count)
        .map(|n| PassengerDetails::named(format!("Passenger {n}")))
        .collect()
}

/// A pending booking priced at 10,000 per passenger with no reductions.
#[must_use]
pub fn booking(slot_id: SlotId, package_id: PackageId, user_id: UserId, passenger_count: u32) -> Booking {
    let subtotal = Money::from_minor(10_000 * i64::from(passenger_count));
    Booking {
        id: BookingId::new(),
        user_id,
        slot_id,
        package_id,
        passenger_count,
        passengers: passengers(passenger_count),
        total_price: subtotal,
        price_breakdown: PriceBreakdown {
            base_price: Money::from_minor(10_000),
            passenger_count,
            subtotal,
            adjustments: Adjustments::new(),
            final_price: subtotal,
        },
        coupon_id: None,
        entitlement_id: None,
        status: BookingStatus::Pending,
        seat_hold: SeatHold::Held,
        notes: None,
        created_at: purchase_time(),
        updated_at: purchase_time(),
    }
}
