//! Prometheus wiring for the core's observability hook.

use std::time::Duration;

use facegate::{HealthState, OrchestrationError, OrchestrationMetrics};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Forwards core events to the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl OrchestrationMetrics for PrometheusMetrics {
    fn record_detect(&self, latency: Duration, result: Result<usize, &OrchestrationError>) {
        histogram!("facegate_detect_duration_seconds").record(latency.as_secs_f64());
        match result {
            Ok(faces) => {
                counter!("facegate_detect_requests_total", "outcome" => "success").increment(1);
                counter!("facegate_detected_faces_total").increment(faces as u64);
            }
            Err(err) => {
                counter!("facegate_detect_requests_total", "outcome" => err.kind()).increment(1);
            }
        }
    }

    fn record_probe(&self, service: &str, latency: Duration, status: HealthState) {
        let healthy = status == HealthState::Healthy;
        histogram!("facegate_probe_duration_seconds", "service" => service.to_string())
            .record(latency.as_secs_f64());
        counter!(
            "facegate_probes_total",
            "service" => service.to_string(),
            "healthy" => if healthy { "true" } else { "false" }
        )
        .increment(1);
    }
}

/// Install the process-wide Prometheus recorder. Can only succeed once per
/// process.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}
