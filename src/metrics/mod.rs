//! Metrics collection for context injection

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Injection metrics
    pub injections: CounterVec,
    pub injection_duration: Histogram,
    pub stage_duration: HistogramVec,

    // Cache metrics
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // Filtering and validation metrics
    pub filter_fallbacks: Counter,
    pub validation_warnings: Counter,
    pub validation_failures: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let injections = register_counter_vec_with_registry!(
            Opts::new("context_injections_total", "Total context injection requests"),
            &["status"],
            registry
        )?;

        let injection_duration = register_histogram_with_registry!(
            "context_injection_duration_seconds",
            "Context injection duration in seconds",
            registry
        )?;

        let stage_duration = register_histogram_vec_with_registry!(
            "context_injection_stage_duration_seconds",
            "Duration of each injection stage in seconds",
            &["stage"],
            registry
        )?;

        let cache_hits = register_counter_with_registry!(
            Opts::new("context_cache_hits_total", "Total bundle cache hits"),
            registry
        )?;

        let cache_misses = register_counter_with_registry!(
            Opts::new("context_cache_misses_total", "Total bundle cache misses"),
            registry
        )?;

        let filter_fallbacks = register_counter_with_registry!(
            Opts::new(
                "context_filter_fallbacks_total",
                "Total fallbacks from advanced to basic filtering"
            ),
            registry
        )?;

        let validation_warnings = register_counter_with_registry!(
            Opts::new("context_validation_warnings_total", "Total validation warnings"),
            registry
        )?;

        let validation_failures = register_counter_with_registry!(
            Opts::new(
                "context_validation_failures_total",
                "Total bundles that failed validation"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            injections,
            injection_duration,
            stage_duration,
            cache_hits,
            cache_misses,
            filter_fallbacks,
            validation_warnings,
            validation_failures,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished injection request
    pub fn record_injection(&self, success: bool, elapsed_ms: f64) {
        let status = if success { "success" } else { "error" };
        self.injections.with_label_values(&[status]).inc();
        self.injection_duration.observe(elapsed_ms / 1000.0);
    }

    /// Record the duration of one pipeline stage
    pub fn record_stage(&self, stage: &str, elapsed_ms: f64) {
        self.stage_duration
            .with_label_values(&[stage])
            .observe(elapsed_ms / 1000.0);
    }

    /// Record a cache lookup
    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.inc();
        } else {
            self.cache_misses.inc();
        }
    }

    /// Record a fallback to the basic filter
    pub fn record_filter_fallback(&self) {
        self.filter_fallbacks.inc();
    }

    /// Record a validation outcome
    pub fn record_validation(&self, is_valid: bool, warnings: usize) {
        self.validation_warnings.inc_by(warnings as f64);
        if !is_valid {
            self.validation_failures.inc();
        }
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_injection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_injection(true, 12.0);
        metrics.record_injection(false, 3.0);
        assert_eq!(metrics.injections.with_label_values(&["success"]).get(), 1.0);
        assert_eq!(metrics.injections.with_label_values(&["error"]).get(), 1.0);
    }

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cache_lookup(true);
        metrics.record_stage("filter", 4.0);
        metrics.record_validation(false, 3);

        let text = metrics.export_prometheus();
        assert!(text.contains("context_cache_hits_total 1"));
        assert!(text.contains("context_injection_stage_duration_seconds"));
        assert!(text.contains("context_validation_warnings_total 3"));
    }
}
