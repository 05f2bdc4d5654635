//! Packages, standing discounts and campaigns.

use crate::{db_error, from_count, record, to_count};
use skyslot_core::store::{BoxFuture, DiscountCatalog, PackageStore};
use skyslot_core::{
    Campaign, CampaignId, Discount, DiscountCondition, DiscountId, DiscountValue, Money,
    OperatorId, Package, PackageId, StoreError,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// `PostgreSQL` [`DiscountCatalog`].
#[derive(Clone, Debug)]
pub struct PostgresDiscountCatalog {
    pool: PgPool,
}

impl PostgresDiscountCatalog {
    /// Create a catalog on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a standing discount.
    ///
    /// # Errors
    ///
    /// A backend failure or a constraint violation.
    pub async fn insert_discount(&self, discount: &Discount) -> Result<(), StoreError> {
        let (kind, value) = discount.value.to_parts();
        sqlx::query(
            "INSERT INTO discounts
                 (id, package_id, discount_type, discount_value, condition, days, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(discount.id.as_uuid())
        .bind(discount.package_id.as_uuid())
        .bind(kind)
        .bind(value)
        .bind(discount.condition.kind_str())
        .bind(discount.condition.iso_days())
        .bind(discount.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert discount", &e))?;
        Ok(())
    }

    /// Stores a campaign.
    ///
    /// # Errors
    ///
    /// A backend failure or a constraint violation.
    pub async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let (kind, value) = campaign.value.to_parts();
        sqlx::query(
            "INSERT INTO campaigns
                 (id, package_id, name, discount_type, discount_value, starts_at, ends_at, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(campaign.id.as_uuid())
        .bind(campaign.package_id.as_uuid())
        .bind(&campaign.name)
        .bind(kind)
        .bind(value)
        .bind(campaign.starts_at)
        .bind(campaign.ends_at)
        .bind(campaign.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert campaign", &e))?;
        Ok(())
    }

    async fn do_discounts(&self, package_id: PackageId) -> Result<Vec<Discount>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, package_id, discount_type, discount_value, condition, days, is_active
             FROM discounts WHERE package_id = $1 ORDER BY id",
        )
        .bind(package_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list discounts", &e))?;
        rows.iter().map(row_to_discount).collect()
    }

    async fn do_campaigns(&self, package_id: PackageId) -> Result<Vec<Campaign>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, package_id, name, discount_type, discount_value, starts_at, ends_at, is_active
             FROM campaigns WHERE package_id = $1 ORDER BY id",
        )
        .bind(package_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list campaigns", &e))?;
        rows.iter().map(row_to_campaign).collect()
    }
}

impl DiscountCatalog for PostgresDiscountCatalog {
    fn discounts_for_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Vec<Discount>, StoreError>> {
        Box::pin(async move {
            let result = self.do_discounts(package_id).await;
            record("catalog", "discounts_for_package", &result);
            result
        })
    }

    fn campaigns_for_package(
        &self,
        package_id: PackageId,
    ) -> BoxFuture<'_, Result<Vec<Campaign>, StoreError>> {
        Box::pin(async move {
            let result = self.do_campaigns(package_id).await;
            record("catalog", "campaigns_for_package", &result);
            result
        })
    }
}

/// `PostgreSQL` [`PackageStore`].
#[derive(Clone, Debug)]
pub struct PostgresPackageStore {
    pool: PgPool,
}

impl PostgresPackageStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a package.
    ///
    /// # Errors
    ///
    /// A backend failure or a constraint violation.
    pub async fn insert(&self, package: &Package) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO packages
                 (id, operator_id, name, base_price, max_passengers, min_tier_sort_order, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(package.id.as_uuid())
        .bind(package.operator_id.as_uuid())
        .bind(&package.name)
        .bind(package.base_price.minor())
        .bind(from_count("max_passengers", package.max_passengers)?)
        .bind(package.min_tier_sort_order)
        .bind(package.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert package", &e))?;
        Ok(())
    }

    async fn do_get(&self, package_id: PackageId) -> Result<Option<Package>, StoreError> {
        let row = sqlx::query(
            "SELECT id, operator_id, name, base_price, max_passengers, min_tier_sort_order, is_active
             FROM packages WHERE id = $1",
        )
        .bind(package_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load package", &e))?;
        row.as_ref().map(row_to_package).transpose()
    }
}

impl PackageStore for PostgresPackageStore {
    fn get(&self, package_id: PackageId) -> BoxFuture<'_, Result<Option<Package>, StoreError>> {
        Box::pin(async move {
            let result = self.do_get(package_id).await;
            record("packages", "get", &result);
            result
        })
    }
}

fn decode_value(row: &PgRow, context: &str) -> Result<DiscountValue, StoreError> {
    let kind: String = row.try_get("discount_type").map_err(|e| db_error(context, &e))?;
    let raw: i64 = row.try_get("discount_value").map_err(|e| db_error(context, &e))?;
    DiscountValue::from_parts(&kind, raw)
        .ok_or_else(|| StoreError::Corrupt(format!("{context}: invalid value {kind} {raw}")))
}

fn row_to_discount(row: &PgRow) -> Result<Discount, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode discount", &e);
    let kind: String = row.try_get("condition").map_err(corrupt)?;
    let days: Vec<i16> = row.try_get("days").map_err(corrupt)?;
    Ok(Discount {
        id: DiscountId::from_uuid(row.try_get("id").map_err(corrupt)?),
        package_id: PackageId::from_uuid(row.try_get("package_id").map_err(corrupt)?),
        value: decode_value(row, "decode discount")?,
        condition: DiscountCondition::from_parts(&kind, &days)
            .ok_or_else(|| StoreError::Corrupt(format!("invalid discount condition: {kind}")))?,
        is_active: row.try_get("is_active").map_err(corrupt)?,
    })
}

fn row_to_campaign(row: &PgRow) -> Result<Campaign, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode campaign", &e);
    Ok(Campaign {
        id: CampaignId::from_uuid(row.try_get("id").map_err(corrupt)?),
        package_id: PackageId::from_uuid(row.try_get("package_id").map_err(corrupt)?),
        name: row.try_get("name").map_err(corrupt)?,
        value: decode_value(row, "decode campaign")?,
        starts_at: row.try_get("starts_at").map_err(corrupt)?,
        ends_at: row.try_get("ends_at").map_err(corrupt)?,
        is_active: row.try_get("is_active").map_err(corrupt)?,
    })
}

fn row_to_package(row: &PgRow) -> Result<Package, StoreError> {
    let corrupt = |e: sqlx::Error| db_error("decode package", &e);
    Ok(Package {
        id: PackageId::from_uuid(row.try_get("id").map_err(corrupt)?),
        operator_id: OperatorId::from_uuid(row.try_get("operator_id").map_err(corrupt)?),
        name: row.try_get("name").map_err(corrupt)?,
        base_price: Money::from_minor(row.try_get("base_price").map_err(corrupt)?),
        max_passengers: to_count("max_passengers", row.try_get("max_passengers").map_err(corrupt)?)?,
        min_tier_sort_order: row.try_get("min_tier_sort_order").map_err(corrupt)?,
        is_active: row.try_get("is_active").map_err(corrupt)?,
    })
}
