//! Property tests over sequences of coordinator operations.

#![allow(clippy::unwrap_used)] // Tests can unwrap

mod common;

use common::Harness;
use proptest::prelude::*;
use skyslot_core::{BookingId, SeatHold};
use skyslot_testing::{FaultOp, fixtures, properties};

#[derive(Clone, Debug)]
enum Step {
    Reserve(u32),
    /// Reserve while the booking insert fails, forcing compensation.
    ReserveFailingInsert(u32),
    Cancel(usize),
    /// Cancel while every seat release fails, leaving the release to resume.
    CancelFailingRelease(usize),
    Confirm(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (1_u32..=4).prop_map(Step::Reserve),
        1 => (1_u32..=4).prop_map(Step::ReserveFailingInsert),
        2 => any::<usize>().prop_map(Step::Cancel),
        1 => any::<usize>().prop_map(Step::CancelFailingRelease),
        1 => any::<usize>().prop_map(Step::Confirm),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Seats held by bookings whose seats were not given back.
fn held_by_bookings(h: &Harness) -> u32 {
    h.backend
        .bookings
        .all()
        .iter()
        .filter(|b| b.seat_hold != SeatHold::Released)
        .map(|b| b.passenger_count)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn seats_always_match_active_bookings(
        capacity in 1_u32..=8,
        steps in proptest::collection::vec(step(), 1..25),
    ) {
        runtime().block_on(async {
            let h = Harness::new();
            let slot = h.slot(capacity).await;
            let mut booked: Vec<BookingId> = Vec::new();

            for step in steps {
                match step {
                    Step::Reserve(n) => {
                        if let Ok(booking) = h.coordinator.reserve_booking(h.request(slot.id, n)).await {
                            booked.push(booking.id);
                        }
                    }
                    Step::ReserveFailingInsert(n) => {
                        h.faults.fail_next(FaultOp::BookingInsert, 1);
                        let result = h.coordinator.reserve_booking(h.request(slot.id, n)).await;
                        prop_assert!(result.is_err());
                        h.faults.clear();
                    }
                    Step::Cancel(i) if !booked.is_empty() => {
                        let _ = h.coordinator.cancel_booking(booked[i % booked.len()]).await;
                    }
                    Step::Confirm(i) if !booked.is_empty() => {
                        let _ = h.coordinator.confirm_booking(booked[i % booked.len()]).await;
                    }
                    Step::CancelFailingRelease(i) if !booked.is_empty() => {
                        h.faults.fail_next(FaultOp::SlotRelease, 10);
                        let _ = h.coordinator.cancel_booking(booked[i % booked.len()]).await;
                        h.faults.clear();
                    }
                    Step::Cancel(_) | Step::CancelFailingRelease(_) | Step::Confirm(_) => {}
                }

                let snapshot = h.backend.slots.snapshot(slot.id).unwrap();
                prop_assert!(snapshot.current_passengers <= snapshot.max_passengers);
                prop_assert!(snapshot.is_consistent());
                prop_assert_eq!(snapshot.current_passengers, held_by_bookings(&h));
            }
            Ok(())
        })?;
    }

    #[test]
    fn quotes_are_repeatable(
        base in properties::base_price(),
        passengers in 1_u32..=4,
        discount in properties::discount_value(),
        condition in properties::discount_condition(),
        campaign in properties::discount_value(),
        coupon in properties::discount_value(),
    ) {
        runtime().block_on(async {
            let h = Harness::new();
            let package = fixtures::package(h.operator_id, base.minor(), 4);
            h.backend.packages.add(package.clone());
            h.backend
                .catalog
                .add_discount(fixtures::discount(package.id, discount, condition));
            h.backend
                .catalog
                .add_campaign(fixtures::campaign(package.id, campaign));
            h.coupon("REPEAT", coupon);

            let first = h
                .coordinator
                .compute_price(package.id, fixtures::tuesday(), passengers, Some("repeat"))
                .await
                .unwrap();
            let second = h
                .coordinator
                .compute_price(package.id, fixtures::tuesday(), passengers, Some(" REPEAT "))
                .await
                .unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!(first.final_price <= first.subtotal);
            prop_assert!(first.final_price.minor() >= 0);
            Ok(())
        })?;
    }
}
