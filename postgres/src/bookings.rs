//! Booking records.

use crate::{db_error, from_count, record, to_count};
use skyslot_core::store::{BoxFuture, BookingStore};
use skyslot_core::{
    Booking, BookingId, BookingStatus, BookingStoreError, CouponId, DateTime, EntitlementId,
    Money, PackageId, PassengerDetails, PriceBreakdown, SeatHold, SlotId, StoreError, UserId, Utc,
};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, user_id, slot_id, package_id, passenger_count, passengers, \
                               total_price, price_breakdown, coupon_id, entitlement_id, status, \
                               seat_hold, notes, created_at, updated_at";

/// `PostgreSQL` [`BookingStore`].
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn do_insert(&self, booking: &Booking) -> Result<(), BookingStoreError> {
        sqlx::query(
            "INSERT INTO bookings
                 (id, user_id, slot_id, package_id, passenger_count, passengers, total_price,
                  price_breakdown, coupon_id, entitlement_id, status, seat_hold, notes,
                  created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.user_id.as_uuid())
        .bind(booking.slot_id.as_uuid())
        .bind(booking.package_id.as_uuid())
        .bind(from_count("passenger_count", booking.passenger_count)?)
        .bind(Json(&booking.passengers))
        .bind(booking.total_price.minor())
        .bind(Json(&booking.price_breakdown))
        .bind(booking.coupon_id.map(|c| *c.as_uuid()))
        .bind(booking.entitlement_id.map(|e| *e.as_uuid()))
        .bind(booking.status.as_str())
        .bind(booking.seat_hold.as_str())
        .bind(booking.notes.as_deref())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert booking", &e))?;
        Ok(())
    }

    async fn fetch(&self, booking_id: BookingId) -> Result<Booking, BookingStoreError> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load booking", &e))?
            .ok_or(BookingStoreError::NotFound(booking_id))?;
        Ok(row_to_booking(&row)?)
    }

    async fn do_remove(&self, booking_id: BookingId) -> Result<(), BookingStoreError> {
        let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("remove booking", &e))?
            .rows_affected();
        if deleted == 0 {
            return Err(BookingStoreError::NotFound(booking_id));
        }
        Ok(())
    }

    async fn do_transition(
        &self,
        booking_id: BookingId,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Booking, BookingStoreError> {
        let sources: Vec<String> = BookingStatus::allowed_sources(to)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let row = sqlx::query(&format!(
            "UPDATE bookings
             SET status = $2,
                 updated_at = $3,
                 seat_hold = CASE WHEN $2 = 'cancelled' THEN 'releasing' ELSE seat_hold END
             WHERE id = $1 AND status = ANY($4)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id.as_uuid())
        .bind(to.as_str())
        .bind(at)
        .bind(&sources)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("transition booking", &e))?;

        if let Some(row) = row {
            return Ok(row_to_booking(&row)?);
        }
        let current = self.fetch(booking_id).await?;
        Err(BookingStoreError::InvalidTransition {
            from: current.status,
            to,
        })
    }

    async fn do_swap_seat_hold(
        &self,
        booking_id: BookingId,
        expected: SeatHold,
        next: SeatHold,
    ) -> Result<Option<Booking>, BookingStoreError> {
        let row = sqlx::query(&format!(
            "UPDATE bookings
             SET seat_hold = $3
             WHERE id = $1 AND seat_hold = $2
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id.as_uuid())
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("swap seat hold", &e))?;

        match row {
            Some(row) => Ok(Some(row_to_booking(&row)?)),
            // Tell an unknown booking apart from a lost swap.
            None => self.fetch(booking_id).await.map(|_| None),
        }
    }
}

impl BookingStore for PostgresBookingStore {
    fn insert(&self, booking: Booking) -> BoxFuture<'_, Result<(), BookingStoreError>> {
        Box::pin(async move {
            let result = self.do_insert(&booking).await;
            record("bookings", "insert", &result);
            result
        })
    }

    fn get(&self, booking_id: BookingId) -> BoxFuture<'_, Result<Booking, BookingStoreError>> {
        Box::pin(async move {
            let result = self.fetch(booking_id).await;
            record("bookings", "get", &result);
            result
        })
    }

    fn remove(&self, booking_id: BookingId) -> BoxFuture<'_, Result<(), BookingStoreError>> {
        Box::pin(async move {
            let result = self.do_remove(booking_id).await;
            record("bookings", "remove", &result);
            result
        })
    }

    fn transition(
        &self,
        booking_id: BookingId,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Booking, BookingStoreError>> {
        Box::pin(async move {
            let result = self.do_transition(booking_id, to, at).await;
            record("bookings", "transition", &result);
            result
        })
    }

    fn swap_seat_hold(
        &self,
        booking_id: BookingId,
        expected: SeatHold,
        next: SeatHold,
    ) -> BoxFuture<'_, Result<Option<Booking>, BookingStoreError>> {
        Box::pin(async move {
            let result = self.do_swap_seat_hold(booking_id, expected, next).await;
            record("bookings", "swap_seat_hold", &result);
            result
        })
    }
}

fn row_to_booking(row: &PgRow) -> Result<Booking, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode booking", &e);
    let status: String = row.try_get("status").map_err(corrupt)?;
    let seat_hold: String = row.try_get("seat_hold").map_err(corrupt)?;
    let Json(passengers): Json<Vec<PassengerDetails>> =
        row.try_get("passengers").map_err(corrupt)?;
    let Json(price_breakdown): Json<PriceBreakdown> =
        row.try_get("price_breakdown").map_err(corrupt)?;
    let coupon_id: Option<Uuid> = row.try_get("coupon_id").map_err(corrupt)?;
    let entitlement_id: Option<Uuid> = row.try_get("entitlement_id").map_err(corrupt)?;
    Ok(Booking {
        id: BookingId::from_uuid(row.try_get("id").map_err(corrupt)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(corrupt)?),
        slot_id: SlotId::from_uuid(row.try_get("slot_id").map_err(corrupt)?),
        package_id: PackageId::from_uuid(row.try_get("package_id").map_err(corrupt)?),
        passenger_count: to_count(
            "passenger_count",
            row.try_get("passenger_count").map_err(corrupt)?,
        )?,
        passengers,
        total_price: Money::from_minor(row.try_get("total_price").map_err(corrupt)?),
        price_breakdown,
        coupon_id: coupon_id.map(CouponId::from_uuid),
        entitlement_id: entitlement_id.map(EntitlementId::from_uuid),
        status: BookingStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid booking status: {status}")))?,
        seat_hold: SeatHold::parse(&seat_hold)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid seat hold: {seat_hold}")))?,
        notes: row.try_get("notes").map_err(corrupt)?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
    })
}
