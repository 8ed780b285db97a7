//! Prometheus metrics for the auto-parts service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "autoparts_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Invoice counter by status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "autoparts_invoices_total",
        "Total number of invoices by status",
        &["status"] // pending, partial, paid
    )
    .expect("Failed to register invoices_total")
});

/// Payment counter by method.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "autoparts_payments_total",
        "Total number of payments by payment method",
        &["payment_method"]
    )
    .expect("Failed to register payments_total")
});

/// Stock movement counter by type.
pub static STOCK_MOVEMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "autoparts_stock_movements_total",
        "Total number of audited stock movements by type",
        &["movement_type"]
    )
    .expect("Failed to register stock_movements_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&STOCK_MOVEMENTS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
