//! Coupon ledger.

use crate::{db_error, from_count, record, to_count};
use skyslot_core::coupon::normalize_code;
use skyslot_core::store::{BoxFuture, CouponLedger};
use skyslot_core::{
    Coupon, CouponError, CouponId, DiscountValue, OperatorId, PackageId, StoreError,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const COUPON_COLUMNS: &str = "id, operator_id, code, discount_type, discount_value, package_id, \
                              expires_at, usage_limit, times_used, is_active";

/// `PostgreSQL` [`CouponLedger`].
#[derive(Clone, Debug)]
pub struct PostgresCouponLedger {
    pool: PgPool,
}

impl PostgresCouponLedger {
    /// Create a ledger on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a coupon under its normalized code.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] when the operator already has the code.
    pub async fn insert(&self, coupon: &Coupon) -> Result<(), CouponError> {
        let (kind, value) = coupon.value.to_parts();
        sqlx::query(
            "INSERT INTO coupons
                 (id, operator_id, code, discount_type, discount_value, package_id,
                  expires_at, usage_limit, times_used, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(coupon.id.as_uuid())
        .bind(coupon.operator_id.as_uuid())
        .bind(normalize_code(&coupon.code))
        .bind(kind)
        .bind(value)
        .bind(coupon.package_id.map(|p| *p.as_uuid()))
        .bind(coupon.expires_at)
        .bind(coupon.usage_limit.map(|l| from_count("usage_limit", l)).transpose()?)
        .bind(from_count("times_used", coupon.times_used)?)
        .bind(coupon.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert coupon", &e))?;
        Ok(())
    }

    async fn do_find(&self, operator_id: OperatorId, code: String) -> Result<Coupon, CouponError> {
        let row = sqlx::query(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE operator_id = $1 AND code = $2"
        ))
        .bind(operator_id.as_uuid())
        .bind(&code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find coupon", &e))?
        .ok_or(CouponError::NotFound(code))?;
        Ok(row_to_coupon(&row)?)
    }

    async fn do_consume(&self, coupon_id: CouponId) -> Result<Coupon, CouponError> {
        let row = sqlx::query(&format!(
            "UPDATE coupons
             SET times_used = times_used + 1
             WHERE id = $1 AND (usage_limit IS NULL OR times_used < usage_limit)
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(coupon_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("consume coupon", &e))?;

        if let Some(row) = row {
            let coupon = row_to_coupon(&row)?;
            tracing::debug!(coupon_id = %coupon_id, times_used = coupon.times_used, "Coupon consumed");
            return Ok(coupon);
        }
        if self.exists(coupon_id).await? {
            Err(CouponError::LimitReached)
        } else {
            Err(CouponError::NotFound(coupon_id.to_string()))
        }
    }

    async fn do_unconsume(&self, coupon_id: CouponId) -> Result<(), CouponError> {
        let updated = sqlx::query(
            "UPDATE coupons SET times_used = GREATEST(times_used - 1, 0) WHERE id = $1",
        )
        .bind(coupon_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("unconsume coupon", &e))?
        .rows_affected();
        if updated == 0 {
            return Err(CouponError::NotFound(coupon_id.to_string()));
        }
        Ok(())
    }

    async fn exists(&self, coupon_id: CouponId) -> Result<bool, StoreError> {
        let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM coupons WHERE id = $1)")
            .bind(coupon_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("check coupon", &e))?;
        Ok(exists)
    }
}

impl CouponLedger for PostgresCouponLedger {
    fn find_by_code(
        &self,
        operator_id: OperatorId,
        normalized_code: String,
    ) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        Box::pin(async move {
            let result = self.do_find(operator_id, normalized_code).await;
            record("coupons", "find_by_code", &result);
            result
        })
    }

    fn consume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<Coupon, CouponError>> {
        Box::pin(async move {
            let result = self.do_consume(coupon_id).await;
            record("coupons", "consume", &result);
            result
        })
    }

    fn unconsume(&self, coupon_id: CouponId) -> BoxFuture<'_, Result<(), CouponError>> {
        Box::pin(async move {
            let result = self.do_unconsume(coupon_id).await;
            record("coupons", "unconsume", &result);
            result
        })
    }
}

fn row_to_coupon(row: &PgRow) -> Result<Coupon, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode coupon", &e);
    let kind: String = row.try_get("discount_type").map_err(corrupt)?;
    let raw: i64 = row.try_get("discount_value").map_err(corrupt)?;
    let package_id: Option<Uuid> = row.try_get("package_id").map_err(corrupt)?;
    let usage_limit: Option<i32> = row.try_get("usage_limit").map_err(corrupt)?;
    Ok(Coupon {
        id: CouponId::from_uuid(row.try_get("id").map_err(corrupt)?),
        operator_id: OperatorId::from_uuid(row.try_get("operator_id").map_err(corrupt)?),
        code: row.try_get("code").map_err(corrupt)?,
        value: DiscountValue::from_parts(&kind, raw)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid coupon value: {kind} {raw}")))?,
        package_id: package_id.map(PackageId::from_uuid),
        expires_at: row.try_get("expires_at").map_err(corrupt)?,
        usage_limit: usage_limit.map(|l| to_count("usage_limit", l)).transpose()?,
        times_used: to_count("times_used", row.try_get("times_used").map_err(corrupt)?)?,
        is_active: row.try_get("is_active").map_err(corrupt)?,
    })
}
