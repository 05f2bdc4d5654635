//! Slot capacity store.

use crate::{db_error, from_count, record, to_count};
use skyslot_core::store::{BoxFuture, SlotStore};
use skyslot_core::{
    NaiveDate, NaiveTime, OperatorId, PackageId, SlotError, SlotId, SlotStatus, StoreError,
    TimeSlot,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SLOT_COLUMNS: &str = "id, operator_id, slot_date, start_time, duration_minutes, \
                            max_passengers, current_passengers, status, package_id";

/// `PostgreSQL` [`SlotStore`].
#[derive(Clone, Debug)]
pub struct PostgresSlotStore {
    pool: PgPool,
}

impl PostgresSlotStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, slot_id: SlotId) -> Result<Option<TimeSlot>, SlotError> {
        let row = sqlx::query(&format!("SELECT {SLOT_COLUMNS} FROM time_slots WHERE id = $1"))
            .bind(slot_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("load slot", &e))?;
        Ok(row.as_ref().map(row_to_slot).transpose()?)
    }

    async fn do_insert(&self, slot: &TimeSlot) -> Result<(), SlotError> {
        sqlx::query(
            "INSERT INTO time_slots
                 (id, operator_id, slot_date, start_time, duration_minutes,
                  max_passengers, current_passengers, status, package_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(slot.id.as_uuid())
        .bind(slot.operator_id.as_uuid())
        .bind(slot.date)
        .bind(slot.start_time)
        .bind(from_count("duration_minutes", slot.duration_minutes)?)
        .bind(from_count("max_passengers", slot.max_passengers)?)
        .bind(from_count("current_passengers", slot.current_passengers)?)
        .bind(slot.status.as_str())
        .bind(slot.package_id.map(|p| *p.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert slot", &e))?;
        Ok(())
    }

    async fn do_slots_on(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, SlotError> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM time_slots
             WHERE operator_id = $1 AND slot_date = $2
             ORDER BY start_time, id"
        ))
        .bind(operator_id.as_uuid())
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list slots", &e))?;
        Ok(rows.iter().map(row_to_slot).collect::<Result<Vec<_>, _>>()?)
    }

    async fn do_reserve(&self, slot_id: SlotId, passengers: u32) -> Result<TimeSlot, SlotError> {
        if passengers == 0 {
            return Err(SlotError::InvalidPassengerCount(0));
        }
        let n = from_count("passengers", passengers)?;
        let row = sqlx::query(&format!(
            "UPDATE time_slots
             SET current_passengers = current_passengers + $2,
                 status = CASE WHEN current_passengers + $2 >= max_passengers
                               THEN 'booked' ELSE 'available' END
             WHERE id = $1
               AND status <> 'closed'
               AND current_passengers + $2 <= max_passengers
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id.as_uuid())
        .bind(n)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("reserve seats", &e))?;

        if let Some(row) = row {
            let slot = row_to_slot(&row)?;
            tracing::debug!(
                slot_id = %slot_id,
                passengers,
                occupied = slot.current_passengers,
                "Seats reserved"
            );
            return Ok(slot);
        }

        // Nothing matched: explain the refusal from the current row.
        let slot = self.fetch(slot_id).await?.ok_or(SlotError::NotFound(slot_id))?;
        Err(slot.check_reservable(passengers).err().unwrap_or(SlotError::Full {
            slot_id,
            requested: passengers,
            available: slot.available_seats(),
        }))
    }

    async fn do_release(&self, slot_id: SlotId, passengers: u32) -> Result<TimeSlot, SlotError> {
        if passengers == 0 {
            return Err(SlotError::InvalidPassengerCount(0));
        }
        let n = from_count("passengers", passengers)?;
        let row = sqlx::query(&format!(
            "UPDATE time_slots
             SET current_passengers = current_passengers - $2,
                 status = CASE WHEN status = 'closed' THEN 'closed'
                               WHEN current_passengers - $2 >= max_passengers THEN 'booked'
                               ELSE 'available' END
             WHERE id = $1 AND current_passengers >= $2
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id.as_uuid())
        .bind(n)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("release seats", &e))?;

        if let Some(row) = row {
            return Ok(row_to_slot(&row)?);
        }
        let slot = self.fetch(slot_id).await?.ok_or(SlotError::NotFound(slot_id))?;
        Err(SlotError::ReleaseExceedsOccupancy {
            slot_id,
            requested: passengers,
            occupied: slot.current_passengers,
        })
    }

    async fn do_set_closed(&self, slot_id: SlotId, closed: bool) -> Result<TimeSlot, SlotError> {
        let row = sqlx::query(&format!(
            "UPDATE time_slots
             SET status = CASE WHEN $2 THEN 'closed'
                               WHEN current_passengers >= max_passengers THEN 'booked'
                               ELSE 'available' END
             WHERE id = $1
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id.as_uuid())
        .bind(closed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("set slot closed", &e))?
        .ok_or(SlotError::NotFound(slot_id))?;
        Ok(row_to_slot(&row)?)
    }

    async fn do_delete(&self, slot_id: SlotId) -> Result<(), SlotError> {
        let deleted = sqlx::query("DELETE FROM time_slots WHERE id = $1 AND current_passengers = 0")
            .bind(slot_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete slot", &e))?
            .rows_affected();
        if deleted == 1 {
            return Ok(());
        }
        let slot = self.fetch(slot_id).await?.ok_or(SlotError::NotFound(slot_id))?;
        slot.check_deletable()?;
        // Emptied between the two statements; the caller may try again.
        Err(StoreError::Conflict(format!("slot {slot_id} changed during delete")).into())
    }
}

impl SlotStore for PostgresSlotStore {
    fn get(&self, slot_id: SlotId) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            let result = self.fetch(slot_id).await.and_then(|s| s.ok_or(SlotError::NotFound(slot_id)));
            record("slots", "get", &result);
            result
        })
    }

    fn insert(&self, slot: TimeSlot) -> BoxFuture<'_, Result<(), SlotError>> {
        Box::pin(async move {
            let result = self.do_insert(&slot).await;
            record("slots", "insert", &result);
            result
        })
    }

    fn reserve(&self, slot_id: SlotId, passengers: u32) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            let result = self.do_reserve(slot_id, passengers).await;
            record("slots", "reserve", &result);
            result
        })
    }

    fn release(&self, slot_id: SlotId, passengers: u32) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            let result = self.do_release(slot_id, passengers).await;
            record("slots", "release", &result);
            result
        })
    }

    fn set_closed(&self, slot_id: SlotId, closed: bool) -> BoxFuture<'_, Result<TimeSlot, SlotError>> {
        Box::pin(async move {
            let result = self.do_set_closed(slot_id, closed).await;
            record("slots", "set_closed", &result);
            result
        })
    }

    fn delete(&self, slot_id: SlotId) -> BoxFuture<'_, Result<(), SlotError>> {
        Box::pin(async move {
            let result = self.do_delete(slot_id).await;
            record("slots", "delete", &result);
            result
        })
    }

    fn slots_on(
        &self,
        operator_id: OperatorId,
        date: NaiveDate,
    ) -> BoxFuture<'_, Result<Vec<TimeSlot>, SlotError>> {
        Box::pin(async move {
            let result = self.do_slots_on(operator_id, date).await;
            record("slots", "slots_on", &result);
            result
        })
    }
}

fn row_to_slot(row: &PgRow) -> Result<TimeSlot, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode slot", &e);
    let status: String = row.try_get("status").map_err(corrupt)?;
    let package_id: Option<Uuid> = row.try_get("package_id").map_err(corrupt)?;
    let start_time: NaiveTime = row.try_get("start_time").map_err(corrupt)?;
    Ok(TimeSlot {
        id: SlotId::from_uuid(row.try_get("id").map_err(corrupt)?),
        operator_id: OperatorId::from_uuid(row.try_get("operator_id").map_err(corrupt)?),
        date: row.try_get("slot_date").map_err(corrupt)?,
        start_time,
        duration_minutes: to_count("duration_minutes", row.try_get("duration_minutes").map_err(corrupt)?)?,
        max_passengers: to_count("max_passengers", row.try_get("max_passengers").map_err(corrupt)?)?,
        current_passengers: to_count(
            "current_passengers",
            row.try_get("current_passengers").map_err(corrupt)?,
        )?,
        status: SlotStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid slot status: {status}")))?,
        package_id: package_id.map(PackageId::from_uuid),
    })
}
