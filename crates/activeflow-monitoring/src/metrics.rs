//! Metrics sinks.

use std::any::Any;
use std::collections::HashMap;

use futures::future::BoxFuture;
use metrics::Label;
use tracing::trace;

use crate::{MetricType, MetricsCollector};

/// Forwards metrics to whatever recorder the `metrics` crate has installed
#[derive(Debug, Default, Clone)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a recorder
    pub fn new() -> Self {
        Self
    }
}

impl MetricsCollector for MetricsRecorder {
    fn record_metric(
        &self,
        name: &str,
        value: f64,
        metric_type: MetricType,
        labels: HashMap<String, String>,
    ) {
        let labels: Vec<Label> = labels
            .into_iter()
            .map(|(k, v)| Label::new(k, v))
            .collect();
        let name = name.to_string();

        match metric_type {
            MetricType::Counter => metrics::counter!(name, value.max(0.0) as u64, labels),
            MetricType::Gauge => metrics::gauge!(name, value, labels),
            MetricType::Histogram | MetricType::Summary => {
                metrics::histogram!(name, value, labels)
            }
        }
    }

    fn flush(&self) -> BoxFuture<'static, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn record_metric(
        &self,
        name: &str,
        value: f64,
        _metric_type: MetricType,
        _labels: HashMap<String, String>,
    ) {
        trace!(metric = name, value, "metric dropped");
    }

    fn flush(&self) -> BoxFuture<'static, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Install a Prometheus recorder for the `metrics` crate and return the
/// handle that renders the scrape output.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_recorder(
) -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle> {
    use anyhow::Context;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_without_installed_backend() {
        let recorder = MetricsRecorder::new();
        let labels = HashMap::from([("action_type".to_string(), "talk".to_string())]);

        recorder.record_metric("activeflow_test_total", 1.0, MetricType::Counter, labels.clone());
        recorder.record_metric("activeflow_test_ms", 12.5, MetricType::Histogram, labels.clone());
        recorder.record_metric("activeflow_test_gauge", 3.0, MetricType::Gauge, labels);

        assert!(recorder.as_any().downcast_ref::<MetricsRecorder>().is_some());
    }

    #[tokio::test]
    async fn test_noop_flush() {
        let noop = NoopMetricsCollector;
        noop.record_metric("x", 1.0, MetricType::Counter, HashMap::new());
        assert_eq!(noop.flush().await, Ok(()));
    }
}
