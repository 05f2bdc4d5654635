//! Support tiers and entitlements.

use crate::{db_error, record};
use skyslot_core::store::{BoxFuture, EntitlementStore};
use skyslot_core::{
    BookingId, Entitlement, EntitlementError, EntitlementId, Money, OperatorId, StoreError,
    SupportTier, TierId, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const ENTITLEMENT_COLUMNS: &str =
    "id, user_id, operator_id, tier_id, tier_sort_order, booking_used, booking_id, granted_at";

/// `PostgreSQL` [`EntitlementStore`].
#[derive(Clone, Debug)]
pub struct PostgresEntitlementStore {
    pool: PgPool,
}

impl PostgresEntitlementStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a support tier.
    ///
    /// # Errors
    ///
    /// A backend failure or a constraint violation.
    pub async fn insert_tier(&self, tier: &SupportTier) -> Result<(), EntitlementError> {
        sqlx::query(
            "INSERT INTO support_tiers (id, operator_id, name, min_amount, max_amount, sort_order)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(tier.id.as_uuid())
        .bind(tier.operator_id.as_uuid())
        .bind(&tier.name)
        .bind(tier.min_amount.minor())
        .bind(tier.max_amount.map(|m| m.minor()))
        .bind(tier.sort_order)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert tier", &e))?;
        Ok(())
    }

    async fn do_tiers(&self, operator_id: OperatorId) -> Result<Vec<SupportTier>, EntitlementError> {
        let rows = sqlx::query(
            "SELECT id, operator_id, name, min_amount, max_amount, sort_order
             FROM support_tiers WHERE operator_id = $1
             ORDER BY sort_order, id",
        )
        .bind(operator_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list tiers", &e))?;
        Ok(rows.iter().map(row_to_tier).collect::<Result<Vec<_>, _>>()?)
    }

    async fn do_insert(&self, entitlement: &Entitlement) -> Result<(), EntitlementError> {
        sqlx::query(
            "INSERT INTO entitlements
                 (id, user_id, operator_id, tier_id, tier_sort_order, booking_used, booking_id,
                  granted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entitlement.id.as_uuid())
        .bind(entitlement.user_id.as_uuid())
        .bind(entitlement.operator_id.as_uuid())
        .bind(entitlement.tier_id.as_uuid())
        .bind(entitlement.tier_sort_order)
        .bind(entitlement.booking_used)
        .bind(entitlement.booking_id.map(|b| *b.as_uuid()))
        .bind(entitlement.granted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert entitlement", &e))?;
        Ok(())
    }

    async fn do_current(
        &self,
        user_id: UserId,
        operator_id: OperatorId,
    ) -> Result<Option<Entitlement>, EntitlementError> {
        let row = sqlx::query(&format!(
            "SELECT {ENTITLEMENT_COLUMNS} FROM entitlements
             WHERE user_id = $1 AND operator_id = $2 AND NOT booking_used
             ORDER BY granted_at DESC, id DESC
             LIMIT 1"
        ))
        .bind(user_id.as_uuid())
        .bind(operator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load entitlement", &e))?;
        Ok(row.as_ref().map(row_to_entitlement).transpose()?)
    }

    async fn do_consume(
        &self,
        entitlement_id: EntitlementId,
        booking_id: BookingId,
    ) -> Result<Entitlement, EntitlementError> {
        let row = sqlx::query(&format!(
            "UPDATE entitlements
             SET booking_used = TRUE, booking_id = $2
             WHERE id = $1 AND NOT booking_used
             RETURNING {ENTITLEMENT_COLUMNS}"
        ))
        .bind(entitlement_id.as_uuid())
        .bind(booking_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("consume entitlement", &e))?;

        if let Some(row) = row {
            return Ok(row_to_entitlement(&row)?);
        }
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM entitlements WHERE id = $1)")
                .bind(entitlement_id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("check entitlement", &e))?;
        if exists {
            Err(EntitlementError::AlreadyConsumed(entitlement_id))
        } else {
            Err(EntitlementError::NotFound(entitlement_id))
        }
    }
}

impl EntitlementStore for PostgresEntitlementStore {
    fn tiers_for_operator(
        &self,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Vec<SupportTier>, EntitlementError>> {
        Box::pin(async move {
            let result = self.do_tiers(operator_id).await;
            record("entitlements", "tiers_for_operator", &result);
            result
        })
    }

    fn insert(&self, entitlement: Entitlement) -> BoxFuture<'_, Result<(), EntitlementError>> {
        Box::pin(async move {
            let result = self.do_insert(&entitlement).await;
            record("entitlements", "insert", &result);
            result
        })
    }

    fn current_for_user(
        &self,
        user_id: UserId,
        operator_id: OperatorId,
    ) -> BoxFuture<'_, Result<Option<Entitlement>, EntitlementError>> {
        Box::pin(async move {
            let result = self.do_current(user_id, operator_id).await;
            record("entitlements", "current_for_user", &result);
            result
        })
    }

    fn consume(
        &self,
        entitlement_id: EntitlementId,
        booking_id: BookingId,
    ) -> BoxFuture<'_, Result<Entitlement, EntitlementError>> {
        Box::pin(async move {
            let result = self.do_consume(entitlement_id, booking_id).await;
            record("entitlements", "consume", &result);
            result
        })
    }
}

fn row_to_tier(row: &PgRow) -> Result<SupportTier, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode tier", &e);
    let max_amount: Option<i64> = row.try_get("max_amount").map_err(corrupt)?;
    Ok(SupportTier {
        id: TierId::from_uuid(row.try_get("id").map_err(corrupt)?),
        operator_id: OperatorId::from_uuid(row.try_get("operator_id").map_err(corrupt)?),
        name: row.try_get("name").map_err(corrupt)?,
        min_amount: Money::from_minor(row.try_get("min_amount").map_err(corrupt)?),
        max_amount: max_amount.map(Money::from_minor),
        sort_order: row.try_get("sort_order").map_err(corrupt)?,
    })
}

fn row_to_entitlement(row: &PgRow) -> Result<Entitlement, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode entitlement", &e);
    let booking_id: Option<Uuid> = row.try_get("booking_id").map_err(corrupt)?;
    Ok(Entitlement {
        id: EntitlementId::from_uuid(row.try_get("id").map_err(corrupt)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(corrupt)?),
        operator_id: OperatorId::from_uuid(row.try_get("operator_id").map_err(corrupt)?),
        tier_id: TierId::from_uuid(row.try_get("tier_id").map_err(corrupt)?),
        tier_sort_order: row.try_get("tier_sort_order").map_err(corrupt)?,
        booking_used: row.try_get("booking_used").map_err(corrupt)?,
        booking_id: booking_id.map(BookingId::from_uuid),
        granted_at: row.try_get("granted_at").map_err(corrupt)?,
    })
}
