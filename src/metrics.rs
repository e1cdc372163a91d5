//! Request instrumentation.
//!
//! Every backend call is timed and reported to a [`RequestDurationSink`]
//! labelled with the operation name and an outcome code. The process-wide
//! Prometheus registry is never touched here; callers inject the sink.

use std::future::Future;
use std::time::{Duration, Instant};

use prometheus::{HistogramOpts, HistogramVec, Registry};

use crate::object_store::ObjectStoreError;

pub const STATUS_OK: &str = "200";
pub const STATUS_ERROR: &str = "500";
pub const STATUS_CANCELLED: &str = "cancel";

/// Receives one observation per completed, failed or abandoned request.
pub trait RequestDurationSink: Send + Sync {
    fn observe(&self, operation: &str, status_code: &str, duration: Duration);
}

/// Discards all observations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl RequestDurationSink for NoopSink {
    fn observe(&self, _operation: &str, _status_code: &str, _duration: Duration) {}
}

/// Histogram of OBS request latency by operation and status code.
#[derive(Clone)]
pub struct PrometheusRequestDuration {
    histogram: HistogramVec,
}

impl PrometheusRequestDuration {
    pub fn new() -> Result<Self, prometheus::Error> {
        let opts = HistogramOpts::new(
            "obs_request_duration_seconds",
            "Time spent doing OBS requests.",
        )
        .namespace("cortex")
        .buckets(vec![0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0]);
        let histogram = HistogramVec::new(opts, &["operation", "status_code"])?;
        Ok(Self { histogram })
    }

    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.histogram.clone()))
    }
}

impl RequestDurationSink for PrometheusRequestDuration {
    fn observe(&self, operation: &str, status_code: &str, duration: Duration) {
        self.histogram
            .with_label_values(&[operation, status_code])
            .observe(duration.as_secs_f64());
    }
}

/// Records [`STATUS_CANCELLED`] if dropped before `finish`.
struct Observation<'a> {
    sink: &'a dyn RequestDurationSink,
    operation: &'static str,
    start: Instant,
    finished: bool,
}

impl Observation<'_> {
    fn finish(&mut self, status_code: &str) -> Duration {
        self.finished = true;
        let elapsed = self.start.elapsed();
        self.sink.observe(self.operation, status_code, elapsed);
        elapsed
    }
}

impl Drop for Observation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let elapsed = self.start.elapsed();
            self.sink.observe(self.operation, STATUS_CANCELLED, elapsed);
            tracing::debug!(operation = self.operation, ?elapsed, "request cancelled");
        }
    }
}

/// Run `request`, reporting its duration and outcome to `sink`.
/// The result passes through untouched.
pub async fn collected_request<T, F>(
    sink: &dyn RequestDurationSink,
    operation: &'static str,
    request: F,
) -> Result<T, ObjectStoreError>
where
    F: Future<Output = Result<T, ObjectStoreError>>,
{
    let mut observation = Observation {
        sink,
        operation,
        start: Instant::now(),
        finished: false,
    };

    let result = request.await;
    match &result {
        Ok(_) => {
            let elapsed = observation.finish(STATUS_OK);
            tracing::debug!(operation, ?elapsed, "request completed");
        }
        Err(e) => {
            let elapsed = observation.finish(STATUS_ERROR);
            tracing::warn!(operation, ?elapsed, error = %e, "request failed");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(sink: &PrometheusRequestDuration, operation: &str, status: &str) -> u64 {
        sink.histogram
            .with_label_values(&[operation, status])
            .get_sample_count()
    }

    #[tokio::test]
    async fn test_success_recorded_as_200() {
        let sink = PrometheusRequestDuration::new().unwrap();
        let value = collected_request(&sink, "OBS.GetObject", async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(count(&sink, "OBS.GetObject", STATUS_OK), 1);
        assert_eq!(count(&sink, "OBS.GetObject", STATUS_ERROR), 0);
    }

    #[tokio::test]
    async fn test_failure_recorded_as_500_and_passed_through() {
        let sink = PrometheusRequestDuration::new().unwrap();
        let result: Result<(), _> = collected_request(&sink, "OBS.DeleteObject", async {
            Err(ObjectStoreError::NotFound("k".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ObjectStoreError::NotFound(ref k)) if k == "k"));
        assert_eq!(count(&sink, "OBS.DeleteObject", STATUS_ERROR), 1);
    }

    #[tokio::test]
    async fn test_dropped_request_recorded_as_cancel() {
        let sink = PrometheusRequestDuration::new().unwrap();
        let request = collected_request(
            &sink,
            "OBS.ListObject",
            std::future::pending::<Result<(), ObjectStoreError>>(),
        );

        let outcome = tokio::time::timeout(Duration::from_millis(10), request).await;
        assert!(outcome.is_err());
        assert_eq!(count(&sink, "OBS.ListObject", STATUS_CANCELLED), 1);
        assert_eq!(count(&sink, "OBS.ListObject", STATUS_OK), 0);
    }

    #[test]
    fn test_register_exposes_histogram() {
        let registry = Registry::new();
        let sink = PrometheusRequestDuration::new().unwrap();
        sink.register(&registry).unwrap();
        sink.observe("OBS.PutObject", STATUS_OK, Duration::from_millis(30));

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "cortex_obs_request_duration_seconds");
    }
}
