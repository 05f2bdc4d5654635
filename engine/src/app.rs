//! Application wiring: stores, services and the metrics exporter.

use crate::config::Config;
use crate::coordinator::ReservationCoordinator;
use crate::environment::{BookingEnvironment, InMemoryBackend};
use crate::error::AppError;
use crate::metrics::MetricsServer;
use crate::operator::OperatorActions;
use skyslot_core::environment::{Clock, SystemClock};
use skyslot_core::store::{BoxFuture, Notifier};
use skyslot_core::{BookingNotification, NotifyError};
use skyslot_postgres::{
    PostgresBookingStore, PostgresCouponLedger, PostgresDiscountCatalog, PostgresEntitlementStore,
    PostgresPackageStore, PostgresSlotStore,
};
use skyslot_testing::InMemoryIdentityProvider;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// [`Notifier`] that writes every event to the log.
///
/// Stands in for the delivery service until one is wired.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: BookingNotification) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(async move {
            let booking = notification.booking();
            tracing::info!(
                event = notification.kind(),
                booking_id = %booking.id,
                user_id = %booking.user_id,
                status = %booking.status,
                "Booking notification"
            );
            Ok(())
        })
    }
}

/// The running engine.
///
/// Owns the coordinator, the operator actions and, when configured, the
/// database pool and the metrics exporter.
pub struct SkyslotApp {
    /// Booking saga, pricing and cancellation
    pub coordinator: ReservationCoordinator,
    /// Slot schedule and entitlement grants
    pub operator: OperatorActions,
    pool: Option<PgPool>,
    metrics: Option<MetricsServer>,
    config: Config,
}

impl SkyslotApp {
    /// Connects to `PostgreSQL`, runs migrations and wires the stores.
    ///
    /// Starts the metrics exporter when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the database is unreachable, a migration
    /// fails or the exporter cannot be installed.
    pub async fn connect(config: Config) -> Result<Self, AppError> {
        tracing::info!("Initializing Skyslot engine...");

        let pg = &config.postgres;
        let options = PgConnectOptions::from_str(&pg.url)?
            .options([("statement_timeout", format!("{}s", pg.statement_timeout))]);
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .min_connections(pg.min_connections)
            .acquire_timeout(Duration::from_secs(pg.connect_timeout))
            .idle_timeout(Some(Duration::from_secs(pg.idle_timeout)))
            .connect_with(options)
            .await?;
        tracing::info!(max_connections = pg.max_connections, "PostgreSQL connected");

        tracing::info!("Running database migrations...");
        skyslot_postgres::migrate(&pool).await?;

        let env = BookingEnvironment {
            slots: Arc::new(PostgresSlotStore::new(pool.clone())),
            coupons: Arc::new(PostgresCouponLedger::new(pool.clone())),
            entitlements: Arc::new(PostgresEntitlementStore::new(pool.clone())),
            catalog: Arc::new(PostgresDiscountCatalog::new(pool.clone())),
            packages: Arc::new(PostgresPackageStore::new(pool.clone())),
            bookings: Arc::new(PostgresBookingStore::new(pool.clone())),
            identity: Arc::new(InMemoryIdentityProvider::new()),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
        };

        let mut app = Self::from_environment(config, env);
        app.pool = Some(pool);
        app.start_metrics()?;
        tracing::info!("Skyslot engine ready");
        Ok(app)
    }

    /// An engine over in-memory stores. The metrics exporter is not started.
    #[must_use]
    pub fn in_memory(config: Config, backend: &InMemoryBackend, clock: Arc<dyn Clock>) -> Self {
        Self::from_environment(config, backend.environment(clock))
    }

    /// An engine over an arbitrary environment.
    #[must_use]
    pub fn from_environment(config: Config, env: BookingEnvironment) -> Self {
        let settings = config.booking_settings();
        let operator = OperatorActions::new(env.clone(), settings.store_retry.clone());
        let coordinator = ReservationCoordinator::new(env, settings);
        Self {
            coordinator,
            operator,
            pool: None,
            metrics: None,
            config,
        }
    }

    /// Installs the Prometheus exporter if enabled and not yet running.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for a bad address, or
    /// [`AppError::Metrics`] if the exporter cannot be installed.
    pub fn start_metrics(&mut self) -> Result<(), AppError> {
        if !self.config.metrics.enabled || self.metrics.is_some() {
            return Ok(());
        }
        let addr = self.config.metrics_addr().map_err(AppError::Config)?;
        let mut server = MetricsServer::new(addr);
        server.start()?;
        self.metrics = Some(server);
        Ok(())
    }

    /// The database pool, when connected to `PostgreSQL`.
    #[must_use]
    pub const fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// Current metrics in Prometheus text format, when the exporter runs.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().and_then(MetricsServer::render)
    }

    /// Configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Closes the database pool.
    pub async fn shutdown(self) {
        if let Some(pool) = self.pool {
            tracing::info!("Closing PostgreSQL pool");
            pool.close().await;
        }
        tracing::info!("Skyslot engine stopped");
    }
}
