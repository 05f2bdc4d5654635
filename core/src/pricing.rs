//! The price computation.
//!
//! Pricing is a pure function of its inputs. Reductions are applied in a
//! fixed order, each on the running amount left by the previous one:
//!
//! 1. subtotal = base price × passengers
//! 2. the single best standing discount valid on the slot date
//! 3. the single best campaign running at the purchase instant
//! 4. the coupon, if one was supplied
//!
//! "Best" is the candidate yielding the largest reduction on the running
//! amount; equal reductions go to the lowest id. Every intermediate amount is
//! an integer number of minor units and never negative.

use crate::coupon::Coupon;
use crate::discount::{Campaign, Discount, DiscountValue};
use crate::error::PricingError;
use crate::types::{CampaignId, CouponId, DiscountId, Money};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Where an applied reduction came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentSource {
    /// An automatic, weekday-conditioned discount
    StandingDiscount {
        /// Discount id
        discount_id: DiscountId,
    },
    /// A time-boxed campaign
    Campaign {
        /// Campaign id
        campaign_id: CampaignId,
        /// Campaign name at pricing time
        name: String,
    },
    /// A redeemed coupon code
    Coupon {
        /// Coupon id
        coupon_id: CouponId,
        /// Normalized code
        code: String,
    },
}

impl AdjustmentSource {
    /// Short label for display and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StandingDiscount { .. } => "discount",
            Self::Campaign { .. } => "campaign",
            Self::Coupon { .. } => "coupon",
        }
    }
}

/// One line of the breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAdjustment {
    /// Origin of the reduction
    pub source: AdjustmentSource,
    /// Configured value
    pub value: DiscountValue,
    /// Running amount before this step
    pub amount_before: Money,
    /// Amount taken off
    pub reduction: Money,
    /// Running amount after this step
    pub amount_after: Money,
}

/// Applied reductions; at most one per mechanism, so three fit inline.
pub type Adjustments = SmallVec<[AppliedAdjustment; 3]>;

/// Itemized trail from base subtotal to final price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Per-passenger base price
    pub base_price: Money,
    /// Passengers priced
    pub passenger_count: u32,
    /// `base_price × passenger_count`
    pub subtotal: Money,
    /// Applied reductions in application order
    pub adjustments: Adjustments,
    /// Price to charge
    pub final_price: Money,
}

impl PriceBreakdown {
    /// Sum of every applied reduction.
    #[must_use]
    pub fn total_reduction(&self) -> Money {
        self.subtotal.saturating_sub_to_zero(self.final_price)
    }

    /// The coupon line, if a coupon was applied.
    #[must_use]
    pub fn coupon(&self) -> Option<&AppliedAdjustment> {
        self.adjustments
            .iter()
            .find(|a| matches!(a.source, AdjustmentSource::Coupon { .. }))
    }
}

/// Everything the computation depends on.
///
/// `discounts` and `campaigns` may hold candidates that do not apply; they
/// are filtered against `slot_date` and `purchased_at` here.
#[derive(Clone, Copy, Debug)]
pub struct PriceInput<'a> {
    /// Per-passenger price
    pub base_price: Money,
    /// Passengers to price
    pub passenger_count: u32,
    /// Package cap on passengers per booking
    pub max_passengers: u32,
    /// Calendar date of the slot, for standing discounts
    pub slot_date: NaiveDate,
    /// Purchase instant, for campaigns
    pub purchased_at: DateTime<Utc>,
    /// Standing discount candidates
    pub discounts: &'a [Discount],
    /// Campaign candidates
    pub campaigns: &'a [Campaign],
    /// An already validated coupon
    pub coupon: Option<&'a Coupon>,
}

/// Computes the price breakdown.
///
/// # Errors
///
/// - [`PricingError::InvalidBasePrice`] when the base price is not positive
/// - [`PricingError::InvalidPassengerCount`] outside `1..=max_passengers`
/// - [`PricingError::InvalidDiscount`] when an applicable component carries a
///   negative fixed amount
/// - [`PricingError::Overflow`] when the subtotal does not fit
pub fn compute_price(input: &PriceInput<'_>) -> Result<PriceBreakdown, PricingError> {
    if !input.base_price.is_positive() {
        return Err(PricingError::InvalidBasePrice(input.base_price.minor()));
    }
    if input.passenger_count == 0 || input.passenger_count > input.max_passengers {
        return Err(PricingError::InvalidPassengerCount {
            requested: input.passenger_count,
            max: input.max_passengers,
        });
    }
    let subtotal = input
        .base_price
        .checked_multiply(input.passenger_count)
        .ok_or(PricingError::Overflow)?;

    let mut adjustments = Adjustments::new();
    let mut running = subtotal;

    let discount = best_candidate(
        input.discounts.iter().filter(|d| d.applies_on(input.slot_date)),
        running,
        |d| (d.id, d.value),
    )?;
    if let Some(d) = discount {
        let source = AdjustmentSource::StandingDiscount { discount_id: d.id };
        running = apply(&mut adjustments, source, d.value, running);
    }

    let campaign = best_candidate(
        input.campaigns.iter().filter(|c| c.is_running(input.purchased_at)),
        running,
        |c| (c.id, c.value),
    )?;
    if let Some(c) = campaign {
        let source = AdjustmentSource::Campaign {
            campaign_id: c.id,
            name: c.name.clone(),
        };
        running = apply(&mut adjustments, source, c.value, running);
    }

    if let Some(coupon) = input.coupon {
        ensure_valid(coupon.value)?;
        let source = AdjustmentSource::Coupon {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
        };
        running = apply(&mut adjustments, source, coupon.value, running);
    }

    Ok(PriceBreakdown {
        base_price: input.base_price,
        passenger_count: input.passenger_count,
        subtotal,
        adjustments,
        final_price: running,
    })
}

fn ensure_valid(value: DiscountValue) -> Result<(), PricingError> {
    match value {
        DiscountValue::FixedAmount(flat) if flat.minor() < 0 => {
            Err(PricingError::InvalidDiscount(format!("negative fixed amount {flat}")))
        }
        _ => Ok(()),
    }
}

/// Largest reduction on `amount`; ties go to the smallest key.
fn best_candidate<'a, T, K, I, F>(
    candidates: I,
    amount: Money,
    key: F,
) -> Result<Option<&'a T>, PricingError>
where
    I: Iterator<Item = &'a T>,
    K: Ord,
    F: Fn(&T) -> (K, DiscountValue),
{
    let mut best: Option<(&'a T, K, Money)> = None;
    for candidate in candidates {
        let (id, value) = key(candidate);
        ensure_valid(value)?;
        let reduction = value.reduction_on(amount);
        let better = match &best {
            None => true,
            Some((_, best_id, best_reduction)) => {
                reduction > *best_reduction || (reduction == *best_reduction && id < *best_id)
            }
        };
        if better {
            best = Some((candidate, id, reduction));
        }
    }
    Ok(best.map(|(candidate, _, _)| candidate))
}

fn apply(
    adjustments: &mut Adjustments,
    source: AdjustmentSource,
    value: DiscountValue,
    amount: Money,
) -> Money {
    let reduction = value.reduction_on(amount);
    let after = amount.saturating_sub_to_zero(reduction);
    adjustments.push(AppliedAdjustment {
        source,
        value,
        amount_before: amount,
        reduction,
        amount_after: after,
    });
    after
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::discount::DiscountCondition;
    use crate::types::{OperatorId, PackageId, Percentage};
    use chrono::{Duration, TimeZone};

    fn pct(p: u32) -> DiscountValue {
        DiscountValue::Percentage(Percentage::from_percent(p).unwrap())
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap()
    }

    fn discount(value: DiscountValue, condition: DiscountCondition) -> Discount {
        Discount {
            id: DiscountId::new(),
            package_id: PackageId::new(),
            value,
            condition,
            is_active: true,
        }
    }

    fn campaign(value: DiscountValue) -> Campaign {
        Campaign {
            id: CampaignId::new(),
            package_id: PackageId::new(),
            name: "Spring".to_string(),
            value,
            starts_at: now() - Duration::days(1),
            ends_at: now() + Duration::days(1),
            is_active: true,
        }
    }

    fn coupon(value: DiscountValue) -> Coupon {
        Coupon {
            id: CouponId::new(),
            operator_id: OperatorId::new(),
            code: "SAVE10".to_string(),
            value,
            package_id: None,
            expires_at: None,
            usage_limit: None,
            times_used: 0,
            is_active: true,
        }
    }

    fn input<'a>(
        discounts: &'a [Discount],
        campaigns: &'a [Campaign],
        coupon: Option<&'a Coupon>,
    ) -> PriceInput<'a> {
        PriceInput {
            base_price: Money::from_minor(50_000),
            passenger_count: 2,
            max_passengers: 4,
            slot_date: tuesday(),
            purchased_at: now(),
            discounts,
            campaigns,
            coupon,
        }
    }

    #[test]
    fn reductions_compose_in_fixed_order() {
        let discounts = [discount(pct(10), DiscountCondition::Weekday)];
        let campaigns = [campaign(pct(20))];
        let c = coupon(pct(10));
        let breakdown = compute_price(&input(&discounts, &campaigns, Some(&c))).unwrap();

        assert_eq!(breakdown.subtotal, Money::from_minor(100_000));
        let steps: Vec<i64> = breakdown.adjustments.iter().map(|a| a.amount_after.minor()).collect();
        assert_eq!(steps, vec![90_000, 72_000, 64_800]);
        assert_eq!(breakdown.final_price, Money::from_minor(64_800));
        assert_eq!(breakdown.total_reduction(), Money::from_minor(35_200));
        assert!(breakdown.coupon().is_some());
    }

    #[test]
    fn only_the_largest_standing_discount_applies() {
        let discounts = [
            discount(pct(5), DiscountCondition::Always),
            discount(DiscountValue::FixedAmount(Money::from_minor(15_000)), DiscountCondition::Always),
            discount(pct(10), DiscountCondition::Always),
        ];
        let breakdown = compute_price(&input(&discounts, &[], None)).unwrap();
        assert_eq!(breakdown.adjustments.len(), 1);
        assert_eq!(breakdown.final_price, Money::from_minor(85_000));
    }

    #[test]
    fn equal_reductions_pick_lowest_id() {
        let a = discount(pct(10), DiscountCondition::Always);
        let b = discount(DiscountValue::FixedAmount(Money::from_minor(10_000)), DiscountCondition::Always);
        let expected = a.id.min(b.id);

        for discounts in [[a.clone(), b.clone()], [b, a]] {
            let breakdown = compute_price(&input(&discounts, &[], None)).unwrap();
            assert_eq!(
                breakdown.adjustments[0].source,
                AdjustmentSource::StandingDiscount { discount_id: expected }
            );
        }
    }

    #[test]
    fn non_matching_candidates_are_ignored() {
        let discounts = [discount(pct(10), DiscountCondition::Weekend)];
        let mut ended = campaign(pct(20));
        ended.ends_at = now() - Duration::seconds(1);
        let breakdown = compute_price(&input(&discounts, &[ended], None)).unwrap();
        assert!(breakdown.adjustments.is_empty());
        assert_eq!(breakdown.final_price, Money::from_minor(100_000));
    }

    #[test]
    fn fixed_amount_clamps_at_zero() {
        let c = coupon(DiscountValue::FixedAmount(Money::from_minor(250_000)));
        let breakdown = compute_price(&input(&[], &[], Some(&c))).unwrap();
        assert_eq!(breakdown.final_price, Money::ZERO);
        assert_eq!(breakdown.adjustments[0].reduction, Money::from_minor(100_000));
    }

    #[test]
    fn rejects_bad_inputs() {
        let mut bad = input(&[], &[], None);
        bad.base_price = Money::ZERO;
        assert_eq!(compute_price(&bad).unwrap_err(), PricingError::InvalidBasePrice(0));

        let mut bad = input(&[], &[], None);
        bad.passenger_count = 0;
        assert!(matches!(compute_price(&bad), Err(PricingError::InvalidPassengerCount { .. })));
        bad.passenger_count = 5;
        assert!(matches!(compute_price(&bad), Err(PricingError::InvalidPassengerCount { .. })));

        let c = coupon(DiscountValue::FixedAmount(Money::from_minor(-1)));
        assert!(matches!(
            compute_price(&input(&[], &[], Some(&c))),
            Err(PricingError::InvalidDiscount(_))
        ));

        let mut huge = input(&[], &[], None);
        huge.base_price = Money::from_minor(i64::MAX);
        assert_eq!(compute_price(&huge).unwrap_err(), PricingError::Overflow);
    }

    #[test]
    fn breakdown_serializes_for_audit() {
        let c = coupon(pct(10));
        let breakdown = compute_price(&input(&[], &[], Some(&c))).unwrap();
        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["subtotal"], 100_000);
        assert_eq!(json["adjustments"][0]["source"]["kind"], "coupon");
        let back: PriceBreakdown = serde_json::from_value(json).unwrap();
        assert_eq!(back, breakdown);
    }
}
