use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_TOTAL: &str = "classbook_bookings_total";

/// Histogram: booking pipeline latency in seconds.
pub const BOOKING_DURATION_SECONDS: &str = "classbook_booking_duration_seconds";

/// Counter: bookings cancelled (any path).
pub const CANCELLATIONS_TOTAL: &str = "classbook_cancellations_total";

/// Counter: self-service cancellations rejected by the 24h window.
pub const WINDOW_REJECTIONS_TOTAL: &str = "classbook_window_rejections_total";

/// Counter: agenda instances materialized from recurrence templates.
pub const MATERIALIZATIONS_TOTAL: &str = "classbook_materializations_total";

// ── Ledger metrics ──────────────────────────────────────────────

/// Counter: credit units consumed by bookings.
pub const CREDITS_CONSUMED_TOTAL: &str = "classbook_credits_consumed_total";

/// Counter: credit units restored by refunded cancellations.
pub const CREDITS_REFUNDED_TOTAL: &str = "classbook_credits_refunded_total";

// ── Notification dispatch ───────────────────────────────────────

/// Counter: notification attempts that will be retried.
pub const NOTIFY_RETRIES_TOTAL: &str = "classbook_notify_retries_total";

/// Counter: notifications abandoned after all retry attempts.
pub const NOTIFY_FAILURES_TOTAL: &str = "classbook_notify_failures_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Install the fmt tracing subscriber. Call once from the embedding process.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
