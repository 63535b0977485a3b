use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    // Session store metrics (Redis or in-memory)
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "session_store_operations_total",
        "Total number of session store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "session_store_operation_duration_seconds",
        "Session store operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    // Business Metrics
    pub static ref QUIZ_GENERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_generations_total",
        "Quiz generation requests by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref QUIZ_BATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_batches_total",
        "Generation batches by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref QUESTIONS_GENERATED_TOTAL: IntCounter = register_int_counter!(
        "questions_generated_total",
        "Total number of questions handed out to clients"
    )
    .unwrap();

    pub static ref QUIZ_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_submissions_total",
        "Graded quiz submissions",
        &["status"]
    )
    .unwrap();

    pub static ref REPORTS_RENDERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reports_rendered_total",
        "Rendered result documents",
        &["format", "status"]
    )
    .unwrap();

    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limited_requests_total",
        "Requests rejected by the rate limiter",
        &["scope"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track session store operation with metrics
pub async fn track_store_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Just verify that all metrics are properly registered
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = QUESTIONS_GENERATED_TOTAL.get();
    }

    #[test]
    fn test_render_metrics() {
        QUIZ_GENERATIONS_TOTAL.with_label_values(&["complete"]).inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("quiz_generations_total"));
    }

    #[tokio::test]
    async fn test_track_store_operation_passes_result_through() {
        let ok: Result<u32, String> = track_store_operation("get", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> =
            track_store_operation("get", async { Err("boom".to_string()) }).await;
        assert!(err.is_err());
        assert!(
            STORE_OPERATIONS_TOTAL
                .with_label_values(&["get", "error"])
                .get()
                >= 1
        );
    }
}
