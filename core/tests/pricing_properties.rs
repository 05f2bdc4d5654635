//! Property tests for the price computation.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use chrono::{DateTime, Duration, NaiveDate, Utc};
use proptest::prelude::*;
use skyslot_core::pricing::{AdjustmentSource, PriceInput, compute_price};
use skyslot_core::{
    Campaign, CampaignId, Coupon, CouponId, Discount, DiscountCondition, DiscountId, DiscountValue,
    Money, OperatorId, PackageId, Percentage,
};

fn slot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()
}

fn purchased_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-05-20T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn value() -> impl Strategy<Value = DiscountValue> {
    prop_oneof![
        (0_u32..=Percentage::MAX_BASIS_POINTS)
            .prop_filter_map("in range", Percentage::from_basis_points)
            .prop_map(DiscountValue::Percentage),
        (0_i64..=20_000_000).prop_map(|m| DiscountValue::FixedAmount(Money::from_minor(m))),
    ]
}

fn discounts() -> impl Strategy<Value = Vec<Discount>> {
    let condition = prop_oneof![
        Just(DiscountCondition::Always),
        Just(DiscountCondition::Weekday),
        Just(DiscountCondition::Weekend),
    ];
    proptest::collection::vec((value(), condition, any::<bool>()), 0..5).prop_map(|items| {
        let package_id = PackageId::new();
        items
            .into_iter()
            .map(|(value, condition, is_active)| Discount {
                id: DiscountId::new(),
                package_id,
                value,
                condition,
                is_active,
            })
            .collect()
    })
}

fn campaigns() -> impl Strategy<Value = Vec<Campaign>> {
    proptest::collection::vec((value(), -10_i64..10, 1_i64..10), 0..4).prop_map(|items| {
        let package_id = PackageId::new();
        items
            .into_iter()
            .map(|(value, start_offset, length)| {
                let starts_at = purchased_at() + Duration::days(start_offset);
                Campaign {
                    id: CampaignId::new(),
                    package_id,
                    name: "Promo".to_string(),
                    value,
                    starts_at,
                    ends_at: starts_at + Duration::days(length),
                    is_active: true,
                }
            })
            .collect()
    })
}

fn coupon() -> impl Strategy<Value = Option<Coupon>> {
    proptest::option::of(value().prop_map(|value| Coupon {
        id: CouponId::new(),
        operator_id: OperatorId::new(),
        code: "PROP".to_string(),
        value,
        package_id: None,
        expires_at: None,
        usage_limit: None,
        times_used: 0,
        is_active: true,
    }))
}

fn input<'a>(
    base: i64,
    passengers: u32,
    discounts: &'a [Discount],
    campaigns: &'a [Campaign],
    coupon: Option<&'a Coupon>,
) -> PriceInput<'a> {
    PriceInput {
        base_price: Money::from_minor(base),
        passenger_count: passengers,
        max_passengers: 10,
        slot_date: slot_date(),
        purchased_at: purchased_at(),
        discounts,
        campaigns,
        coupon,
    }
}

proptest! {
    #[test]
    fn final_price_stays_between_zero_and_subtotal(
        base in 1_i64..=10_000_000,
        passengers in 1_u32..=10,
        discounts in discounts(),
        campaigns in campaigns(),
        coupon in coupon(),
    ) {
        let breakdown =
            compute_price(&input(base, passengers, &discounts, &campaigns, coupon.as_ref())).unwrap();

        prop_assert_eq!(breakdown.subtotal.minor(), base * i64::from(passengers));
        prop_assert!(breakdown.final_price.minor() >= 0);
        prop_assert!(breakdown.final_price <= breakdown.subtotal);
    }

    #[test]
    fn adjustments_chain_from_subtotal_to_final(
        base in 1_i64..=10_000_000,
        passengers in 1_u32..=10,
        discounts in discounts(),
        campaigns in campaigns(),
        coupon in coupon(),
    ) {
        let breakdown =
            compute_price(&input(base, passengers, &discounts, &campaigns, coupon.as_ref())).unwrap();

        let mut running = breakdown.subtotal;
        for line in &breakdown.adjustments {
            prop_assert_eq!(line.amount_before, running);
            prop_assert_eq!(line.amount_after, running.saturating_sub_to_zero(line.reduction));
            running = line.amount_after;
        }
        prop_assert_eq!(running, breakdown.final_price);
        prop_assert!(breakdown.adjustments.len() <= 3);
    }

    #[test]
    fn one_reduction_per_mechanism_in_fixed_order(
        base in 1_i64..=10_000_000,
        discounts in discounts(),
        campaigns in campaigns(),
        coupon in coupon(),
    ) {
        let breakdown =
            compute_price(&input(base, 2, &discounts, &campaigns, coupon.as_ref())).unwrap();

        let kinds: Vec<_> = breakdown.adjustments.iter().map(|a| a.source.kind()).collect();
        let mut expected = kinds.clone();
        expected.sort_by_key(|kind| match *kind {
            "discount" => 0,
            "campaign" => 1,
            _ => 2,
        });
        expected.dedup();
        prop_assert_eq!(kinds, expected);
        prop_assert_eq!(
            breakdown.coupon().is_some(),
            coupon.is_some(),
        );
    }

    #[test]
    fn candidate_order_does_not_change_the_price(
        base in 1_i64..=10_000_000,
        passengers in 1_u32..=10,
        discounts in discounts(),
        campaigns in campaigns(),
    ) {
        let forward = compute_price(&input(base, passengers, &discounts, &campaigns, None)).unwrap();

        let mut reversed_discounts = discounts.clone();
        reversed_discounts.reverse();
        let mut reversed_campaigns = campaigns.clone();
        reversed_campaigns.reverse();
        let backward =
            compute_price(&input(base, passengers, &reversed_discounts, &reversed_campaigns, None))
                .unwrap();

        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn a_coupon_never_raises_the_price(
        base in 1_i64..=10_000_000,
        passengers in 1_u32..=10,
        discounts in discounts(),
        campaigns in campaigns(),
        coupon in coupon(),
    ) {
        let without = compute_price(&input(base, passengers, &discounts, &campaigns, None)).unwrap();
        let with =
            compute_price(&input(base, passengers, &discounts, &campaigns, coupon.as_ref())).unwrap();

        prop_assert!(with.final_price <= without.final_price);
        if let Some(line) = with.coupon() {
            prop_assert!(matches!(line.source, AdjustmentSource::Coupon { .. }), "expected coupon adjustment source");
            prop_assert_eq!(line.amount_before, without.final_price);
        }
    }

    #[test]
    fn passenger_count_outside_the_cap_is_refused(
        base in 1_i64..=10_000_000,
        passengers in prop_oneof![Just(0_u32), 11_u32..100],
    ) {
        prop_assert!(compute_price(&input(base, passengers, &[], &[], None)).is_err());
    }
}
