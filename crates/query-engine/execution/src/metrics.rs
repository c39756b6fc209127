//! Metrics setup and update for statement execution.

use prometheus::core::{AtomicU64, GenericCounter};
use prometheus::Histogram;

/// Statement and eager-load metrics, registered in the registry the caller passes
/// to [`Metrics::initialize`].
#[derive(Debug, Clone)]
pub struct Metrics {
    pub statements_total: GenericCounter<AtomicU64>,
    pub eager_round_trips_total: GenericCounter<AtomicU64>,
    pub eager_failures_total: GenericCounter<AtomicU64>,
    pub statement_duration: Histogram,
}

impl Metrics {
    /// Set up counters and histograms used to produce Prometheus metrics.
    pub fn initialize(metrics_registry: &mut prometheus::Registry) -> Result<Self, prometheus::Error> {
        let statements_total = add_int_counter_metric(
            metrics_registry,
            "dialect_compat_statements_total",
            "Total statements executed.",
        )?;

        let eager_round_trips_total = add_int_counter_metric(
            metrics_registry,
            "dialect_compat_eager_round_trips_total",
            "Total round trips made to load associations.",
        )?;

        let eager_failures_total = add_int_counter_metric(
            metrics_registry,
            "dialect_compat_eager_failures_total",
            "Total eager loads aborted by a failed fetch.",
        )?;

        let statement_duration = add_histogram_metric(
            metrics_registry,
            "dialect_compat_statement_duration_seconds",
            "Time taken to execute a statement and fetch its rows, in seconds.",
        )?;

        Ok(Self {
            statements_total,
            eager_round_trips_total,
            eager_failures_total,
            statement_duration,
        })
    }
}

/// Create a new int counter metric and register it with the provided Prometheus Registry
fn add_int_counter_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericCounter<AtomicU64>, prometheus::Error> {
    let int_counter =
        prometheus::IntCounter::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_counter.clone()))?;
    Ok(int_counter)
}

/// Create a new histogram metric and register it with the provided Prometheus Registry
fn add_histogram_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<Histogram, prometheus::Error> {
    let histogram = Histogram::with_opts(prometheus::HistogramOpts::new(
        metric_name,
        metric_description,
    ))?;
    metrics_registry.register(Box::new(histogram.clone()))?;
    Ok(histogram)
}
