/// Prometheus metrics for the diagnosis service.
///
/// Metrics live in a process-wide registry and are exposed in text format
/// on `GET /metrics`.
///
/// # Example
/// ```no_run
/// use obesity_risk::metrics::{init_metrics, DIAGNOSES_TOTAL};
///
/// init_metrics().unwrap();
/// DIAGNOSES_TOTAL
///     .with_label_values(&["Normal_Weight", "normal"])
///     .inc();
/// ```

mod middleware;

pub use middleware::track_http_metrics;

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "obesity_risk";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    // ============================================================================
    // Diagnosis Metrics
    // ============================================================================

    /// Completed diagnoses
    ///
    /// Labels: label, risk_level
    pub static ref DIAGNOSES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("diagnoses_total", "Total number of completed diagnoses")
            .namespace(NAMESPACE),
        &["label", "risk_level"]
    ).expect("Failed to create DIAGNOSES_TOTAL metric");

    /// Failed diagnoses
    ///
    /// Labels: kind (error code)
    pub static ref DIAGNOSIS_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("diagnosis_errors_total", "Total number of failed diagnoses")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create DIAGNOSIS_ERRORS_TOTAL metric");

    /// Encode + predict latency
    ///
    /// Labels: outcome (success, error)
    pub static ref DIAGNOSIS_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "diagnosis_duration_seconds",
            "Diagnosis duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["outcome"]
    ).expect("Failed to create DIAGNOSIS_DURATION_SECONDS metric");

    // ============================================================================
    // Model Metrics
    // ============================================================================

    /// Number of feature columns of the loaded model, 0 until loaded
    pub static ref MODEL_FEATURES: Gauge = Gauge::with_opts(
        Opts::new("model_features", "Number of feature columns of the loaded model")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_FEATURES metric");

    /// Number of target classes of the loaded model, 0 until loaded
    pub static ref MODEL_CLASSES: Gauge = Gauge::with_opts(
        Opts::new("model_classes", "Number of target classes of the loaded model")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_CLASSES metric");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once: collectors that are already registered are
/// skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(DIAGNOSES_TOTAL.clone()),
        Box::new(DIAGNOSIS_ERRORS_TOTAL.clone()),
        Box::new(DIAGNOSIS_DURATION_SECONDS.clone()),
        Box::new(MODEL_FEATURES.clone()),
        Box::new(MODEL_CLASSES.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
