//! The booking saga.
//!
//! A booking attempt walks `Validating → Pricing → Reserving → Confirming →
//! Done`, or stops in `Failed`. Nothing is held before `Reserving`, so
//! failures there need no cleanup. Once seats are held, every failure runs
//! the compensating actions for the steps that succeeded, newest first:
//!
//! | Step | Compensation |
//! |------|--------------|
//! | `SlotStore::reserve` | `SlotStore::release` |
//! | `BookingStore::insert` | `BookingStore::remove` |
//! | `CouponLedger::consume` | `CouponLedger::unconsume` |
//! | `EntitlementStore::consume` | none; it runs last |
//!
//! Writes are never cut off mid-flight. The request deadline is checked
//! between writes instead, and a deadline that passes after `Reserving` is
//! handled like any other failure. The last check runs just before the
//! entitlement is spent, so a booking either commits in time or is undone.

use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::eligibility_gate::EligibilityGate;
use crate::metrics;
use crate::pricing_engine::PricingEngine;
use crate::retry::{RetryPolicy, retry_transient};
use serde::{Deserialize, Serialize};
use skyslot_core::{
    Booking, BookingId, BookingNotification, BookingStatus, BookingStoreError, CouponId,
    Eligibility, NaiveDate, Package, PackageId, PassengerDetails, PriceBreakdown, SeatHold,
    SlotError, SlotId, TimeSlot, UserId,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Tunables for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Deadline for one booking attempt
    pub request_timeout: Duration,
    /// Longest accepted booking note, in characters
    pub max_notes_len: usize,
    /// Retry policy for reads before any capacity is held
    pub store_retry: RetryPolicy,
    /// Retry policy for compensating actions and cancellation releases
    pub compensation_retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            max_notes_len: 2_000,
            store_retry: RetryPolicy::default(),
            compensation_retry: RetryPolicy::builder().max_retries(3).build(),
        }
    }
}

/// A request to book seats on a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Who is booking
    pub user_id: UserId,
    /// Slot to fly on
    pub slot_id: SlotId,
    /// Package being bought
    pub package_id: PackageId,
    /// Seats requested; must match `passengers`
    pub passenger_count: u32,
    /// One entry per passenger
    pub passengers: Vec<PassengerDetails>,
    /// Optional coupon code, matched case-insensitively
    pub coupon_code: Option<String>,
    /// Optional free-form note for the operator
    pub notes: Option<String>,
}

impl BookingRequest {
    /// A request for the given passengers, without coupon or notes.
    #[must_use]
    pub fn new(
        user_id: UserId,
        slot_id: SlotId,
        package_id: PackageId,
        passengers: Vec<PassengerDetails>,
    ) -> Self {
        Self {
            user_id,
            slot_id,
            package_id,
            passenger_count: u32::try_from(passengers.len()).unwrap_or(u32::MAX),
            passengers,
            coupon_code: None,
            notes: None,
        }
    }

    /// Attach a coupon code.
    #[must_use]
    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    /// Attach a note.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Where a booking attempt is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPhase {
    /// Checking input, slot state and eligibility
    Validating,
    /// Computing the price and validating the coupon
    Pricing,
    /// Taking the seats
    Reserving,
    /// Writing the booking and spending the coupon and entitlement
    Confirming,
    /// A pending booking exists
    Done,
    /// The attempt stopped; nothing it did is left behind
    Failed,
}

impl BookingPhase {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Pricing => "pricing",
            Self::Reserving => "reserving",
            Self::Confirming => "confirming",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Everything `Validating` established.
struct Validated {
    package: Package,
    slot: TimeSlot,
    eligibility: Eligibility,
    notes: Option<String>,
}

/// Side effects of `Confirming` that succeeded so far.
#[derive(Debug, Default)]
struct Held {
    booking: Option<BookingId>,
    coupon: Option<CouponId>,
}

/// Runs booking attempts, confirmations and cancellations.
#[derive(Clone)]
pub struct ReservationCoordinator {
    env: BookingEnvironment,
    pricing: PricingEngine,
    gate: EligibilityGate,
    settings: CoordinatorSettings,
}

impl ReservationCoordinator {
    /// Create a coordinator over `env`.
    #[must_use]
    pub fn new(env: BookingEnvironment, settings: CoordinatorSettings) -> Self {
        let pricing = PricingEngine::new(
            Arc::clone(&env.packages),
            Arc::clone(&env.catalog),
            Arc::clone(&env.coupons),
            Arc::clone(&env.clock),
            settings.store_retry.clone(),
        );
        let gate = EligibilityGate::new(
            Arc::clone(&env.identity),
            Arc::clone(&env.entitlements),
            settings.store_retry.clone(),
        );
        Self {
            env,
            pricing,
            gate,
            settings,
        }
    }

    /// The pricing service.
    #[must_use]
    pub const fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    /// The eligibility service.
    #[must_use]
    pub const fn gate(&self) -> &EligibilityGate {
        &self.gate
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Prices a prospective booking without holding anything.
    ///
    /// # Errors
    ///
    /// See [`PricingEngine::compute_price`].
    pub async fn compute_price(
        &self,
        package_id: PackageId,
        slot_date: NaiveDate,
        passenger_count: u32,
        coupon_code: Option<&str>,
    ) -> Result<PriceBreakdown, BookingError> {
        self.pricing
            .compute_price(package_id, slot_date, passenger_count, coupon_code)
            .await
    }

    /// Books seats, returning the new `pending` booking.
    ///
    /// On error no seats, coupon use, entitlement or booking row is left
    /// behind, except for [`BookingError::CompensationFailed`], which names
    /// the resource that could not be given back.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidInput`] for malformed requests
    /// - [`BookingError::Ineligible`] when the tier gate refuses the user
    /// - [`BookingError::SlotUnavailable`] when the slot is closed or too
    ///   full at validation time
    /// - [`BookingError::SlotFull`] when the seats went to someone else
    ///   between validation and reservation
    /// - [`BookingError::InvalidCoupon`] when the coupon is rejected
    /// - [`BookingError::StoreUnavailable`] or [`BookingError::Timeout`]
    ///   when the attempt may be retried as a whole
    /// - [`BookingError::CompensationFailed`] when cleanup failed
    #[tracing::instrument(
        skip(self, request),
        name = "reserve_booking",
        fields(
            user_id = %request.user_id,
            slot_id = %request.slot_id,
            passengers = request.passenger_count
        )
    )]
    pub async fn reserve_booking(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        let started = std::time::Instant::now();
        let deadline = Instant::now() + self.settings.request_timeout;
        let mut phase = BookingPhase::Validating;

        let result = self.attempt(request, deadline, &mut phase).await;
        match &result {
            Ok(booking) => {
                tracing::info!(
                    booking_id = %booking.id,
                    total_price = booking.total_price.minor(),
                    phase = BookingPhase::Done.as_str(),
                    "Booking created"
                );
                metrics::record_seats_reserved(booking.passenger_count);
                if booking.coupon_id.is_some() {
                    metrics::record_coupon_redeemed();
                }
                self.dispatch(BookingNotification::Created(booking.clone()));
            }
            Err(error) => {
                tracing::info!(
                    failed_in = phase.as_str(),
                    phase = BookingPhase::Failed.as_str(),
                    error = %error,
                    remediation = error.remediation().as_str(),
                    "Booking attempt failed"
                );
            }
        }
        metrics::record_booking_attempt(&result, started.elapsed());
        result
    }

    async fn attempt(
        &self,
        request: BookingRequest,
        deadline: Instant,
        phase: &mut BookingPhase,
    ) -> Result<Booking, BookingError> {
        let now = self.env.clock.now();

        enter(phase, BookingPhase::Validating);
        let validated = within(deadline, self.validate(&request)).await?;

        enter(phase, BookingPhase::Pricing);
        let quote = within(
            deadline,
            self.pricing.quote(
                &validated.package,
                validated.slot.date,
                request.passenger_count,
                request.coupon_code.as_deref(),
                now,
            ),
        )
        .await?;

        enter(phase, BookingPhase::Reserving);
        check_deadline(deadline)?;
        let slot = self
            .env
            .slots
            .reserve(request.slot_id, request.passenger_count)
            .await?;
        tracing::debug!(
            available = slot.available_seats(),
            status = %slot.status,
            "Seats held"
        );

        enter(phase, BookingPhase::Confirming);
        let booking = Booking {
            id: BookingId::new(),
            user_id: request.user_id,
            slot_id: request.slot_id,
            package_id: request.package_id,
            passenger_count: request.passenger_count,
            passengers: request.passengers,
            total_price: quote.breakdown.final_price,
            coupon_id: quote.coupon.as_ref().map(|c| c.id),
            entitlement_id: validated.eligibility.entitlement_to_consume(),
            price_breakdown: quote.breakdown,
            status: BookingStatus::Pending,
            seat_hold: SeatHold::Held,
            notes: validated.notes,
            created_at: now,
            updated_at: now,
        };

        let mut held = Held::default();
        match self.confirm(&booking, deadline, &mut held).await {
            Ok(()) => {
                enter(phase, BookingPhase::Done);
                Ok(booking)
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    remediation = error.remediation().as_str(),
                    "Confirming failed, compensating"
                );
                self.compensate(booking.slot_id, booking.passenger_count, held)
                    .await?;
                Err(error)
            }
        }
    }

    async fn validate(&self, request: &BookingRequest) -> Result<Validated, BookingError> {
        let notes = check_request(request, self.settings.max_notes_len)?;

        let package = self.pricing.load_package(request.package_id).await?;
        if request.passenger_count > package.max_passengers {
            return Err(BookingError::InvalidInput(format!(
                "package {} takes at most {} passengers per booking",
                package.id, package.max_passengers
            )));
        }

        let slot = retry_transient(&self.settings.store_retry, || {
            self.env.slots.get(request.slot_id)
        })
        .await?;
        if slot.operator_id != package.operator_id
            || slot.package_id.is_some_and(|id| id != package.id)
        {
            return Err(BookingError::InvalidInput(format!(
                "slot {} does not offer package {}",
                slot.id, package.id
            )));
        }
        slot.check_reservable(request.passenger_count)
            .map_err(|e| match e {
                SlotError::Closed(_) | SlotError::Full { .. } => BookingError::SlotUnavailable(e),
                other => other.into(),
            })?;

        let eligibility = self.gate.check(request.user_id, &package).await?;
        if !eligibility.can_book() {
            return Err(BookingError::Ineligible(eligibility));
        }

        Ok(Validated {
            package,
            slot,
            eligibility,
            notes,
        })
    }

    /// The forward writes after the seats are held.
    ///
    /// The entitlement is spent last because it cannot be given back. The
    /// deadline is checked once more before it, with or without one, and
    /// nothing after it can fail the attempt.
    async fn confirm(
        &self,
        booking: &Booking,
        deadline: Instant,
        held: &mut Held,
    ) -> Result<(), BookingError> {
        check_deadline(deadline)?;
        self.env.bookings.insert(booking.clone()).await?;
        held.booking = Some(booking.id);

        if let Some(coupon_id) = booking.coupon_id {
            check_deadline(deadline)?;
            let coupon = self.env.coupons.consume(coupon_id).await?;
            held.coupon = Some(coupon_id);
            tracing::debug!(%coupon_id, times_used = coupon.times_used, "Coupon consumed");
        }

        check_deadline(deadline)?;
        if let Some(entitlement_id) = booking.entitlement_id {
            self.env
                .entitlements
                .consume(entitlement_id, booking.id)
                .await?;
            tracing::debug!(%entitlement_id, "Entitlement consumed");
        }
        Ok(())
    }

    /// Undoes `held` and the seat reservation, newest first.
    ///
    /// Every step is attempted even when an earlier one fails, so the seats
    /// are released whenever possible.
    async fn compensate(
        &self,
        slot_id: SlotId,
        passengers: u32,
        held: Held,
    ) -> Result<(), BookingError> {
        let policy = &self.settings.compensation_retry;
        let mut failure = None;

        if let Some(coupon_id) = held.coupon {
            metrics::record_compensation("unconsume_coupon");
            tracing::warn!(%coupon_id, "Compensating: returning coupon use");
            if let Err(e) = retry_transient(policy, || self.env.coupons.unconsume(coupon_id)).await {
                tracing::error!(%coupon_id, error = %e, "Failed to return coupon use");
                failure.get_or_insert(BookingError::CompensationFailed {
                    step: "unconsume_coupon",
                    cause: e.to_string(),
                });
            }
        }

        if let Some(booking_id) = held.booking {
            metrics::record_compensation("remove_booking");
            tracing::warn!(%booking_id, "Compensating: removing booking");
            if let Err(e) = retry_transient(policy, || self.env.bookings.remove(booking_id)).await {
                tracing::error!(%booking_id, error = %e, "Failed to remove booking");
                failure.get_or_insert(BookingError::CompensationFailed {
                    step: "remove_booking",
                    cause: e.to_string(),
                });
            }
        }

        metrics::record_compensation("release_seats");
        tracing::warn!(%slot_id, passengers, "Compensating: releasing seats");
        match retry_transient(policy, || self.env.slots.release(slot_id, passengers)).await {
            Ok(_) => metrics::record_seats_released(passengers),
            Err(e) => {
                tracing::error!(%slot_id, passengers, error = %e, "Failed to release seats");
                failure.get_or_insert(BookingError::CompensationFailed {
                    step: "release_seats",
                    cause: e.to_string(),
                });
            }
        }

        failure.map_or(Ok(()), Err)
    }

    /// Cancels a `pending` or `confirmed` booking and frees its seats.
    ///
    /// The coupon use and entitlement it consumed stay consumed. The status
    /// change also claims the seat release, so two concurrent cancellations
    /// release the seats once. When the release fails the claim is handed
    /// back and the booking stays `cancelled` with its seats held; calling
    /// this again resumes the release.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown booking
    /// - [`BookingError::InvalidTransition`] when it is already cancelled
    ///   and its seats are released or being released
    /// - [`BookingError::CompensationFailed`] when the booking was cancelled
    ///   but its seats could not be released
    /// - [`BookingError::StoreUnavailable`] when the status change failed
    #[tracing::instrument(skip(self), name = "cancel_booking")]
    pub async fn cancel_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let policy = &self.settings.compensation_retry;
        let booking = match self
            .env
            .bookings
            .transition(booking_id, BookingStatus::Cancelled, self.env.clock.now())
            .await
        {
            Ok(booking) => booking,
            Err(BookingStoreError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to,
            }) => {
                let claimed = retry_transient(policy, || {
                    self.env
                        .bookings
                        .swap_seat_hold(booking_id, SeatHold::Held, SeatHold::Releasing)
                })
                .await?;
                let Some(booking) = claimed else {
                    return Err(BookingError::InvalidTransition {
                        from: BookingStatus::Cancelled,
                        to,
                    });
                };
                tracing::info!("Resuming seat release of a cancelled booking");
                booking
            }
            Err(e) => return Err(e.into()),
        };

        let (slot_id, passengers) = (booking.slot_id, booking.passenger_count);
        if let Err(e) = retry_transient(policy, || self.env.slots.release(slot_id, passengers)).await
        {
            tracing::error!(%slot_id, passengers, error = %e, "Cancelled booking still holds seats");
            if let Err(unclaim) = retry_transient(policy, || {
                self.env
                    .bookings
                    .swap_seat_hold(booking_id, SeatHold::Releasing, SeatHold::Held)
            })
            .await
            {
                tracing::error!(error = %unclaim, "Seat release stays claimed, cancellation cannot resume");
            }
            return Err(BookingError::CompensationFailed {
                step: "release_seats",
                cause: e.to_string(),
            });
        }

        metrics::record_seats_released(passengers);
        let booking = match retry_transient(policy, || {
            self.env
                .bookings
                .swap_seat_hold(booking_id, SeatHold::Releasing, SeatHold::Released)
        })
        .await
        {
            Ok(Some(released)) => released,
            Ok(None) => booking,
            Err(e) => {
                // Capacity is already right; only the marker lags.
                tracing::warn!(error = %e, "Failed to mark seats released");
                booking
            }
        };

        metrics::record_cancellation();
        tracing::info!(%slot_id, passengers, "Booking cancelled");
        self.dispatch(BookingNotification::Cancelled(booking.clone()));
        Ok(booking)
    }

    /// Operator confirmation: `pending → confirmed`.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`], [`BookingError::InvalidTransition`] or a
    /// store failure.
    #[tracing::instrument(skip(self), name = "confirm_booking")]
    pub async fn confirm_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let booking = self
            .env
            .bookings
            .transition(booking_id, BookingStatus::Confirmed, self.env.clock.now())
            .await?;
        tracing::info!("Booking confirmed");
        self.dispatch(BookingNotification::Confirmed(booking.clone()));
        Ok(booking)
    }

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] or a store failure.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        Ok(retry_transient(&self.settings.store_retry, || self.env.bookings.get(booking_id)).await?)
    }

    /// Hands a notification to the notifier without waiting for it.
    fn dispatch(&self, notification: BookingNotification) {
        let notifier = Arc::clone(&self.env.notifier);
        tokio::spawn(async move {
            let kind = notification.kind();
            let booking_id = notification.booking().id;
            if let Err(e) = notifier.notify(notification).await {
                metrics::record_notification_failed();
                tracing::warn!(%booking_id, kind, error = %e, "Notification not delivered");
            }
        });
    }
}

fn enter(current: &mut BookingPhase, next: BookingPhase) {
    tracing::debug!(from = current.as_str(), to = next.as_str(), "Booking phase");
    *current = next;
}

fn check_deadline(deadline: Instant) -> Result<(), BookingError> {
    if Instant::now() >= deadline {
        return Err(BookingError::Timeout);
    }
    Ok(())
}

async fn within<T>(
    deadline: Instant,
    step: impl Future<Output = Result<T, BookingError>>,
) -> Result<T, BookingError> {
    tokio::time::timeout_at(deadline, step)
        .await
        .map_err(|_| BookingError::Timeout)?
}

/// Shape checks that need no store. Returns the trimmed note.
fn check_request(request: &BookingRequest, max_notes_len: usize) -> Result<Option<String>, BookingError> {
    if request.passenger_count == 0 {
        return Err(BookingError::InvalidInput(
            "at least one passenger is required".to_string(),
        ));
    }
    if request.passengers.len() != request.passenger_count as usize {
        return Err(BookingError::InvalidInput(format!(
            "{} passenger records for {} passengers",
            request.passengers.len(),
            request.passenger_count
        )));
    }
    for (index, passenger) in request.passengers.iter().enumerate() {
        passenger
            .validate()
            .map_err(|reason| BookingError::InvalidInput(format!("passenger {}: {reason}", index + 1)))?;
    }

    let notes = request
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if let Some(n) = notes {
        if n.chars().count() > max_notes_len {
            return Err(BookingError::InvalidInput(format!(
                "notes exceed {max_notes_len} characters"
            )));
        }
    }
    Ok(notes.map(ToString::to_string))
}
