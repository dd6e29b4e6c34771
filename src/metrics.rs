use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and describe the pipeline series
    /// so they show up on /metrics before the first query.
    pub fn init(registered_sources: usize) -> Self {
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!("queries_total", "Queries accepted by the /query endpoint.");
        describe_counter!("diagnoses_total", "Diagnostic runs via /diagnose.");
        describe_counter!("dispatch_calls_total", "Tool calls fanned out to sources.");
        describe_counter!(
            "dispatch_failures_total",
            "Tool calls that failed or timed out."
        );

        // Static gauge with the registry size at startup.
        gauge!("registered_sources").set(registered_sources as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
