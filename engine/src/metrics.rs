//! Business metrics for the booking engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `skyslot_bookings_total{outcome}` - Booking attempts by outcome (`done` or an error kind)
//! - `skyslot_compensations_total{step}` - Compensating actions run after a failed attempt
//! - `skyslot_seats_reserved_total` - Seats taken by completed bookings
//! - `skyslot_seats_released_total` - Seats given back by cancellations and compensation
//! - `skyslot_coupon_redemptions_total` - Coupon uses recorded by completed bookings
//! - `skyslot_cancellations_total` - Bookings cancelled
//! - `skyslot_notifications_failed_total` - Notifications the dispatcher could not deliver
//! - `skyslot_store_operations_total{store,op,result}` - Store calls (`PostgreSQL` backend)
//!
//! ## Histograms
//! - `skyslot_booking_duration_seconds` - Wall time of a booking attempt
//!
//! # Example
//!
//! ```rust,no_run
//! use skyslot_engine::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use crate::error::BookingError;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter serving `/metrics` over HTTP.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server that will listen on `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the exporter.
    ///
    /// Must run inside a Tokio runtime; the exporter spawns its HTTP
    /// listener on it.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a
    /// different recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_business_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let (recorder, exporter) = builder
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder)
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "Metrics exporter stopped");
            }
        });
        self.handle = Some(handle);
        tracing::info!(addr = %self.addr, "Metrics available at http://{}/metrics", self.addr);
        Ok(())
    }

    /// Render the current metrics in Prometheus text format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for every business metric.
///
/// Call once at start-up, before any metric is recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "skyslot_bookings_total",
        "Booking attempts by outcome (done or the error kind)"
    );
    describe_histogram!(
        "skyslot_booking_duration_seconds",
        "Wall time of a booking attempt"
    );
    describe_counter!(
        "skyslot_compensations_total",
        "Compensating actions run after a failed booking attempt, by step"
    );
    describe_counter!(
        "skyslot_seats_reserved_total",
        "Seats taken by completed bookings"
    );
    describe_counter!(
        "skyslot_seats_released_total",
        "Seats given back by cancellations and compensation"
    );
    describe_counter!(
        "skyslot_coupon_redemptions_total",
        "Coupon uses recorded by completed bookings"
    );
    describe_counter!("skyslot_cancellations_total", "Bookings cancelled");
    describe_counter!(
        "skyslot_notifications_failed_total",
        "Booking notifications that could not be delivered"
    );
    describe_counter!(
        "skyslot_store_operations_total",
        "Store calls by store, operation and result"
    );

    tracing::info!("Business metrics registered");
}

/// Record the outcome of a booking attempt.
pub fn record_booking_attempt<T>(result: &Result<T, BookingError>, elapsed: Duration) {
    let outcome = match result {
        Ok(_) => "done",
        Err(e) => e.kind(),
    };
    metrics::counter!("skyslot_bookings_total", "outcome" => outcome).increment(1);
    metrics::histogram!("skyslot_booking_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record seats taken by a completed booking.
pub fn record_seats_reserved(passengers: u32) {
    metrics::counter!("skyslot_seats_reserved_total").increment(u64::from(passengers));
}

/// Record seats handed back.
pub fn record_seats_released(passengers: u32) {
    metrics::counter!("skyslot_seats_released_total").increment(u64::from(passengers));
}

/// Record a coupon use.
pub fn record_coupon_redeemed() {
    metrics::counter!("skyslot_coupon_redemptions_total").increment(1);
}

/// Record a compensating action.
pub fn record_compensation(step: &'static str) {
    metrics::counter!("skyslot_compensations_total", "step" => step).increment(1);
}

/// Record a cancellation.
pub fn record_cancellation() {
    metrics::counter!("skyslot_cancellations_total").increment(1);
}

/// Record an undelivered notification.
pub fn record_notification_failed() {
    metrics::counter!("skyslot_notifications_failed_total").increment(1);
}
