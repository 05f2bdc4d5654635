//! # Skyslot Engine
//!
//! Slot reservation, pricing and entitlement services for a flight operator.
//!
//! - **Pricing**: [`PricingEngine`] gathers a package's standing discounts,
//!   running campaigns and an optional coupon, then applies them in a fixed
//!   order
//! - **Tier gate**: [`EligibilityGate`] decides whether a user may book a
//!   tier-gated package
//! - **Booking saga**: [`ReservationCoordinator`] takes seats, writes the
//!   booking and spends coupon and entitlement, compensating on failure
//! - **Operator actions**: [`OperatorActions`] schedules, closes, reopens and
//!   deletes slots, lists availability and grants entitlements
//!
//! # Architecture
//!
//! ```text
//!   reserve_booking(request)
//!          │
//!   ┌──────▼──────┐   ┌───────────┐   ┌───────────┐   ┌────────────┐
//!   │ Validating  ├──►│  Pricing  ├──►│ Reserving ├──►│ Confirming │──► Done
//!   └──────┬──────┘   └─────┬─────┘   └─────┬─────┘   └─────┬──────┘
//!          │                │               │               │
//!          └────────────────┴───────────────┴───────────────┴──► Failed
//!                                                   (compensates held seats,
//!                                                    booking row, coupon use)
//! ```
//!
//! Every store is a trait object from `skyslot-core`. [`SkyslotApp`] wires
//! either the `PostgreSQL` stores or the in-memory ones.
//!
//! # Example
//!
//! ```
//! use skyslot_engine::{BookingRequest, Config, InMemoryBackend, SkyslotApp};
//! use skyslot_core::{OperatorId, UserId};
//! use skyslot_core::store::SlotStore;
//! use skyslot_testing::{fixtures, test_clock};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let backend = InMemoryBackend::new();
//! let operator_id = OperatorId::new();
//! let package = fixtures::package(operator_id, 50_000, 4);
//! let slot = fixtures::slot(operator_id, fixtures::tuesday(), 6);
//! backend.packages.add(package.clone());
//! backend.slots.insert(slot.clone()).await.unwrap();
//!
//! let app = SkyslotApp::in_memory(Config::from_lookup(|_| None), &backend, Arc::new(test_clock()));
//! let request = BookingRequest::new(UserId::new(), slot.id, package.id, fixtures::passengers(2));
//! let booking = app.coordinator.reserve_booking(request).await.unwrap();
//!
//! assert_eq!(booking.total_price.minor(), 100_000);
//! assert_eq!(backend.slots.snapshot(slot.id).unwrap().current_passengers, 2);
//! # });
//! ```

pub mod app;
pub mod config;
pub mod coordinator;
pub mod eligibility_gate;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod operator;
pub mod pricing_engine;
pub mod retry;

pub use app::{LogNotifier, SkyslotApp};
pub use config::Config;
pub use coordinator::{BookingPhase, BookingRequest, CoordinatorSettings, ReservationCoordinator};
pub use eligibility_gate::EligibilityGate;
pub use environment::{BookingEnvironment, InMemoryBackend};
pub use error::{AppError, BookingError, Remediation};
pub use operator::{OperatorActions, SlotSchedule};
pub use pricing_engine::{PricingEngine, Quote};
pub use retry::RetryPolicy;
