//! Monitoring for the activeflow engine: structured logging and metrics.
//!
//! The engine never touches process globals for metrics. A
//! [`MetricsCollector`] is built once at startup and handed to it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::any::Any;
use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Context;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod logging;
pub mod metrics;

/// Type of metric for collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Counter metrics accumulate values
    Counter,
    /// Gauge metrics record current values
    Gauge,
    /// Histogram metrics observe distributions
    Histogram,
    /// Summary metrics collect observations with quantiles
    Summary,
}

/// Interface for collecting metrics
pub trait MetricsCollector: Send + Sync {
    /// Record a metric with the given name, value, type, and labels
    fn record_metric(
        &self,
        name: &str,
        value: f64,
        metric_type: MetricType,
        labels: HashMap<String, String>,
    );

    /// Flush metrics to the backend
    fn flush(&self) -> BoxFuture<'static, Result<(), String>>;

    /// Convert to Any for downcasting in tests
    fn as_any(&self) -> &dyn Any;
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line, for log aggregation
    Json,
    /// Human-readable multi-line output
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// Service name attached to logs
    pub service_name: String,
    /// Enable metrics
    pub enable_metrics: bool,
    /// Log level filter used when `RUST_LOG` is unset (e.g., "info,activeflow_core=debug")
    pub log_filter: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "activeflow".to_string(),
            enable_metrics: true,
            log_filter: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `ACTIVEFLOW_SERVICE_NAME` (default: activeflow)
    /// - `ACTIVEFLOW_LOG_FILTER` (default: info)
    /// - `ACTIVEFLOW_LOG_FORMAT` (default: json)
    /// - `ACTIVEFLOW_METRICS_ENABLED` (default: true)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let log_format = match std::env::var("ACTIVEFLOW_LOG_FORMAT") {
            Ok(raw) => raw
                .parse()
                .map_err(anyhow::Error::msg)
                .context("invalid ACTIVEFLOW_LOG_FORMAT")?,
            Err(_) => defaults.log_format,
        };

        let enable_metrics = match std::env::var("ACTIVEFLOW_METRICS_ENABLED") {
            Ok(raw) => raw
                .trim()
                .parse::<bool>()
                .context("invalid ACTIVEFLOW_METRICS_ENABLED")?,
            Err(_) => defaults.enable_metrics,
        };

        Ok(Self {
            service_name: std::env::var("ACTIVEFLOW_SERVICE_NAME")
                .unwrap_or(defaults.service_name),
            enable_metrics,
            log_filter: std::env::var("ACTIVEFLOW_LOG_FILTER").unwrap_or(defaults.log_filter),
            log_format,
        })
    }
}

/// Initialize logging and pick the metrics sink
pub fn init(config: &MonitoringConfig) -> anyhow::Result<std::sync::Arc<dyn MetricsCollector>> {
    logging::init_logging(config)?;

    let collector: std::sync::Arc<dyn MetricsCollector> = if config.enable_metrics {
        std::sync::Arc::new(metrics::MetricsRecorder::new())
    } else {
        std::sync::Arc::new(metrics::NoopMetricsCollector)
    };

    info!(
        service_name = %config.service_name,
        metrics_enabled = config.enable_metrics,
        "Monitoring initialized"
    );
    Ok(collector)
}
