//! Prometheus metrics for stream workers

use crate::error::{ErrorCategory, StreamError};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// Call this once at startup. Subsequent calls are no-ops.
pub fn init_metrics() -> Result<(), StreamError> {
    PROMETHEUS_HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            info!("Prometheus metrics initialized");
            Ok::<_, metrics_exporter_prometheus::BuildError>(handle)
        })
        .map(|_| ())
        .map_err(|e| StreamError::Config(format!("failed to install Prometheus recorder: {e}")))
}

/// Get the Prometheus handle for rendering metrics
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    prometheus_handle().map(|h| h.render()).unwrap_or_default()
}

/// Stream worker metrics helper
#[derive(Clone)]
pub struct StreamMetrics {
    stream_name: String,
    processor_name: String,
}

impl StreamMetrics {
    pub fn new(stream_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            processor_name: processor_name.into(),
        }
    }

    pub fn message_received(&self) {
        counter!(
            "stream_worker_messages_received_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn message_processed(&self, duration: Duration) {
        counter!(
            "stream_worker_messages_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "stream_worker_message_duration_seconds",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    pub fn message_failed(&self, category: ErrorCategory) {
        counter!(
            "stream_worker_messages_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "failed"
        )
        .increment(1);

        counter!(
            "stream_worker_message_errors_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "category" => category.as_str()
        )
        .increment(1);
    }

    /// Payload could not be decoded and was dropped
    pub fn message_malformed(&self) {
        counter!(
            "stream_worker_messages_malformed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn message_dead_lettered(&self) {
        counter!(
            "stream_worker_messages_dlq_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn read_error(&self) {
        counter!(
            "stream_worker_read_errors_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = StreamMetrics::new("test:stream", "test_processor");
        assert_eq!(metrics.stream_name, "test:stream");
        assert_eq!(metrics.processor_name, "test_processor");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = StreamMetrics::new("s", "p");
        metrics.message_received();
        metrics.message_failed(ErrorCategory::Transient);
        metrics.read_error();
    }

    #[test]
    fn test_init_is_idempotent() {
        init_metrics().unwrap();
        init_metrics().unwrap();
        assert!(prometheus_handle().is_some());
    }
}
