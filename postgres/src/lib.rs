//! `PostgreSQL` store implementations for Skyslot.
//!
//! This crate implements every store trait from `skyslot-core` on top of a
//! shared sqlx connection pool:
//!
//! - [`PostgresSlotStore`]: capacity counters, one conditional `UPDATE` per change
//! - [`PostgresCouponLedger`]: usage counters, limit re-checked inside the `UPDATE`
//! - [`PostgresEntitlementStore`]: tiers and single-use entitlements
//! - [`PostgresDiscountCatalog`] and [`PostgresPackageStore`]: read-mostly catalog
//! - [`PostgresBookingStore`]: bookings with JSONB passengers and price breakdown
//!
//! Contended rows are never read, checked in Rust and written back. Each
//! check-and-update is a single statement whose `WHERE` clause carries the
//! check, so row-level locking in `PostgreSQL` makes it linearizable per row.
//!
//! # Example
//!
//! ```no_run
//! use skyslot_postgres::{PostgresSlotStore, migrate};
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/skyslot").await?;
//! migrate(&pool).await?;
//! let slots = PostgresSlotStore::new(pool);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bookings;
mod catalog;
mod coupons;
mod entitlements;
mod slots;

pub use bookings::PostgresBookingStore;
pub use catalog::{PostgresDiscountCatalog, PostgresPackageStore};
pub use coupons::PostgresCouponLedger;
pub use entitlements::PostgresEntitlementStore;
pub use slots::PostgresSlotStore;

use skyslot_core::StoreError;
use sqlx::PgPool;

/// Runs the bundled schema migrations.
///
/// # Errors
///
/// Returns the migrator's error if a migration fails to apply.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Maps a sqlx failure onto the backend-neutral [`StoreError`].
pub(crate) fn db_error(context: &str, error: &sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            StoreError::Conflict(format!("{context}: {error}"))
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(format!("{context}: {error}")),
        _ => StoreError::Unavailable(format!("{context}: {error}")),
    }
}

/// Converts a stored `INTEGER` count to `u32`, rejecting negatives.
pub(crate) fn to_count(column: &str, value: i32) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

/// Converts a count to the `INTEGER` a column stores.
pub(crate) fn from_count(column: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Conflict(format!("{column} out of range: {value}")))
}

/// Counts one store call by outcome.
pub(crate) fn record<T, E>(store: &'static str, op: &'static str, result: &Result<T, E>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(
        "skyslot_store_operations_total",
        "store" => store,
        "op" => op,
        "result" => outcome
    )
    .increment(1);
}
