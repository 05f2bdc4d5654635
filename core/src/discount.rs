//! Standing discounts and time-boxed campaigns.

use crate::types::{CampaignId, DiscountId, Money, PackageId, Percentage};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The shape of a price reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    /// A share of the running amount
    Percentage(Percentage),
    /// A flat amount off the whole booking
    FixedAmount(Money),
}

impl DiscountValue {
    /// Reduction this value yields on `amount`, never more than `amount`.
    ///
    /// A negative fixed amount yields no reduction.
    #[must_use]
    pub fn reduction_on(&self, amount: Money) -> Money {
        if !amount.is_positive() {
            return Money::ZERO;
        }
        match self {
            Self::Percentage(pct) => amount.percentage_of(*pct).min(amount),
            Self::FixedAmount(flat) => {
                if flat.is_positive() {
                    (*flat).min(amount)
                } else {
                    Money::ZERO
                }
            }
        }
    }

    /// Database representation: the kind string and the raw integer value
    /// (basis points or minor units).
    #[must_use]
    pub fn to_parts(&self) -> (&'static str, i64) {
        match self {
            Self::Percentage(pct) => ("percentage", i64::from(pct.basis_points())),
            Self::FixedAmount(flat) => ("fixed_amount", flat.minor()),
        }
    }

    /// Rebuilds a value from its database representation.
    #[must_use]
    pub fn from_parts(kind: &str, value: i64) -> Option<Self> {
        match kind {
            "percentage" => u32::try_from(value)
                .ok()
                .and_then(Percentage::from_basis_points)
                .map(Self::Percentage),
            "fixed_amount" => Some(Self::FixedAmount(Money::from_minor(value))),
            _ => None,
        }
    }
}

impl fmt::Display for DiscountValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentage(pct) => write!(f, "{pct}"),
            Self::FixedAmount(flat) => write!(f, "{flat} off"),
        }
    }
}

/// When a standing discount applies, evaluated against the slot's date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "days", rename_all = "snake_case")]
pub enum DiscountCondition {
    /// Every day
    Always,
    /// Monday to Friday
    Weekday,
    /// Saturday and Sunday
    Weekend,
    /// An explicit set of weekdays
    Days(Vec<Weekday>),
}

impl DiscountCondition {
    /// Whether the condition holds on `date`.
    #[must_use]
    pub fn matches(&self, date: NaiveDate) -> bool {
        let day = date.weekday();
        match self {
            Self::Always => true,
            Self::Weekday => !is_weekend(day),
            Self::Weekend => is_weekend(day),
            Self::Days(days) => days.contains(&day),
        }
    }

    /// Database representation of the condition kind.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Weekday => "weekday",
            Self::Weekend => "weekend",
            Self::Days(_) => "specific_days",
        }
    }

    /// Rebuilds a condition from its kind string and, for `specific_days`,
    /// ISO weekday numbers (Monday = 1).
    #[must_use]
    pub fn from_parts(kind: &str, iso_days: &[i16]) -> Option<Self> {
        match kind {
            "always" => Some(Self::Always),
            "weekday" => Some(Self::Weekday),
            "weekend" => Some(Self::Weekend),
            "specific_days" => iso_days
                .iter()
                .map(|d| weekday_from_iso(*d))
                .collect::<Option<Vec<_>>>()
                .map(Self::Days),
            _ => None,
        }
    }

    /// ISO weekday numbers for `specific_days`; empty for the other kinds.
    #[must_use]
    pub fn iso_days(&self) -> Vec<i16> {
        match self {
            Self::Days(days) => days
                .iter()
                .map(|d| i16::try_from(d.number_from_monday()).unwrap_or(0))
                .collect(),
            _ => Vec::new(),
        }
    }
}

const fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

const fn weekday_from_iso(day: i16) -> Option<Weekday> {
    match day {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// An automatic discount on a package, conditioned on the slot's weekday.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    /// Discount id
    pub id: DiscountId,
    /// Package it applies to
    pub package_id: PackageId,
    /// Reduction
    pub value: DiscountValue,
    /// Weekday condition
    pub condition: DiscountCondition,
    /// Inactive discounts never apply
    pub is_active: bool,
}

impl Discount {
    /// Whether the discount applies to a slot on `slot_date`.
    #[must_use]
    pub fn applies_on(&self, slot_date: NaiveDate) -> bool {
        self.is_active && self.condition.matches(slot_date)
    }
}

/// A purchase-time promotion with an explicit window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign id
    pub id: CampaignId,
    /// Package it applies to
    pub package_id: PackageId,
    /// Display name
    pub name: String,
    /// Reduction
    pub value: DiscountValue,
    /// First instant the campaign runs
    pub starts_at: DateTime<Utc>,
    /// Last instant the campaign runs
    pub ends_at: DateTime<Utc>,
    /// Inactive campaigns never apply, even inside their window
    pub is_active: bool,
}

impl Campaign {
    /// Whether the campaign applies to a purchase at `now`.
    ///
    /// Both bounds are inclusive.
    #[must_use]
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 3).unwrap()
    }

    fn saturday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 7).unwrap()
    }

    #[test]
    fn weekday_and_weekend_conditions() {
        assert!(DiscountCondition::Weekday.matches(tuesday()));
        assert!(!DiscountCondition::Weekday.matches(saturday()));
        assert!(DiscountCondition::Weekend.matches(saturday()));
        assert!(!DiscountCondition::Weekend.matches(tuesday()));
        assert!(DiscountCondition::Always.matches(saturday()));
    }

    #[test]
    fn specific_days_condition() {
        let cond = DiscountCondition::Days(vec![Weekday::Tue, Weekday::Thu]);
        assert!(cond.matches(tuesday()));
        assert!(!cond.matches(saturday()));

        let rebuilt = DiscountCondition::from_parts(cond.kind_str(), &cond.iso_days()).unwrap();
        assert_eq!(rebuilt, cond);
        assert!(DiscountCondition::from_parts("specific_days", &[8]).is_none());
    }

    #[test]
    fn reductions_are_capped() {
        let amount = Money::from_minor(1_000);
        assert_eq!(
            DiscountValue::FixedAmount(Money::from_minor(5_000)).reduction_on(amount),
            amount
        );
        assert_eq!(
            DiscountValue::FixedAmount(Money::from_minor(-5)).reduction_on(amount),
            Money::ZERO
        );
        assert_eq!(
            DiscountValue::Percentage(Percentage::from_percent(25).unwrap()).reduction_on(amount),
            Money::from_minor(250)
        );
    }

    #[test]
    fn inactive_discount_never_applies() {
        let discount = Discount {
            id: DiscountId::new(),
            package_id: PackageId::new(),
            value: DiscountValue::Percentage(Percentage::from_percent(10).unwrap()),
            condition: DiscountCondition::Always,
            is_active: false,
        };
        assert!(!discount.applies_on(tuesday()));
    }

    #[test]
    fn campaign_window_is_inclusive_and_needs_active_flag() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut campaign = Campaign {
            id: CampaignId::new(),
            package_id: PackageId::new(),
            name: "Summer".to_string(),
            value: DiscountValue::Percentage(Percentage::from_percent(20).unwrap()),
            starts_at: start,
            ends_at: start + Duration::days(30),
            is_active: true,
        };
        assert!(campaign.is_running(start));
        assert!(campaign.is_running(start + Duration::days(30)));
        assert!(!campaign.is_running(start - Duration::seconds(1)));
        assert!(!campaign.is_running(start + Duration::days(31)));

        campaign.is_active = false;
        assert!(!campaign.is_running(start + Duration::days(1)));
    }

    #[test]
    fn value_parts_round_trip() {
        let pct = DiscountValue::Percentage(Percentage::from_basis_points(1_250).unwrap());
        let (kind, raw) = pct.to_parts();
        assert_eq!(DiscountValue::from_parts(kind, raw), Some(pct));
        assert!(DiscountValue::from_parts("percentage", 20_000).is_none());
        assert!(DiscountValue::from_parts("bogus", 1).is_none());
    }
}
