// src/diagnose/mod.rs
//! Second-stage diagnostic engine: re-reads the orchestrated results as
//! qualitative health signals, narrative, and recommendations.
//!
//! Every stage is a pure function of the extracted metrics snapshot (plus
//! the signal/asset lists computed before it), so the whole report is
//! deterministic for identical pipeline output.

pub mod advice;
pub mod metrics;
pub mod narrative;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dispatch::{dispatch, RawResult, ToolTransport};
use crate::registry::Registry;
use crate::router::{CallParams, QueryContext, ToolCall};
use crate::synthesize::{synthesize, Synthesis};

use advice::{Possibility, Suggestions};
use metrics::HealthMetrics;
use rules::{Asset, OverallAssessment, StressSignal};

/// What the first pipeline stage hands to the diagnostic engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub results: Vec<RawResult>,
    pub synthesis: Synthesis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub health_metrics: HealthMetrics,
    pub narrative: String,
    pub stress_signals: Vec<StressSignal>,
    pub assets: Vec<Asset>,
    pub possibilities: Vec<Possibility>,
    pub suggestions: Suggestions,
    pub overall_assessment: OverallAssessment,
}

/// Run the full diagnostic chain over already-materialized pipeline output.
pub fn diagnose(query: &str, data: &PipelineOutput, _context: &QueryContext) -> DiagnosisReport {
    let health_metrics = metrics::extract(&data.results);
    let stress_signals = rules::stress_signals(&health_metrics);
    let assets = rules::assets(&health_metrics);
    let narrative = narrative::generate(&health_metrics);
    let possibilities = advice::possibilities(&health_metrics, &stress_signals, &assets);
    let suggestions = advice::suggestions(&health_metrics, &stress_signals, &possibilities);
    let overall_assessment = rules::overall_assessment(&stress_signals);

    debug!(
        target: "diagnose",
        query_id = %crate::anon_hash(query),
        signals = stress_signals.len(),
        assets = assets.len(),
        status = ?overall_assessment.status,
        "diagnosis complete"
    );

    DiagnosisReport {
        health_metrics,
        narrative,
        stress_signals,
        assets,
        possibilities,
        suggestions,
        overall_assessment,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaHealthReport {
    pub area: String,
    pub period_days: u32,
    pub service_health: Option<Value>,
    pub housing_health: Option<Value>,
    pub overall_diagnosis: DiagnosisReport,
}

/// Convenience composition: fetch the two health endpoints (311 + housing)
/// for an area and feed their combined payloads through the diagnostic
/// chain. This is a caller of the pipeline, not part of its core logic.
pub async fn area_health(
    area: &str,
    days: u32,
    registry: &Registry,
    transport: Arc<dyn ToolTransport>,
    call_timeout: Duration,
) -> Result<AreaHealthReport> {
    let params = CallParams {
        borough: Some(area.to_string()),
        days: Some(days),
        ..CallParams::default()
    };
    let calls = vec![
        ToolCall {
            source: "nyc-311".to_string(),
            operation: "get_neighborhood_health".to_string(),
            params: params.clone(),
        },
        ToolCall {
            source: "nyc-hpd".to_string(),
            operation: "get_housing_health".to_string(),
            params,
        },
    ];

    let results = dispatch(&calls, registry, transport, call_timeout).await;
    let synthesis = synthesize(&results);
    let service_health = results[0].payload.clone();
    let housing_health = results[1].payload.clone();
    let output = PipelineOutput { results, synthesis };
    let overall_diagnosis = diagnose("neighborhood health", &output, &QueryContext::default());

    Ok(AreaHealthReport {
        area: area.to_string(),
        period_days: days,
        service_health,
        housing_health,
        overall_diagnosis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::RawResult;
    use serde_json::json;

    fn pipeline_output(results: Vec<RawResult>) -> PipelineOutput {
        let synthesis = synthesize(&results);
        PipelineOutput { results, synthesis }
    }

    #[test]
    fn diagnose_on_empty_results_is_healthy() {
        let report = diagnose("anything", &pipeline_output(vec![]), &QueryContext::default());
        assert!(report.stress_signals.is_empty());
        assert!(report.assets.is_empty());
        assert_eq!(report.overall_assessment.status, rules::HealthStatus::Healthy);
    }

    #[test]
    fn diagnose_is_idempotent() {
        let output = pipeline_output(vec![RawResult::ok(
            "nyc-311",
            "get_neighborhood_health",
            json!({
                "resolution_rate": 45,
                "health_signals": {"service_responsiveness": "low", "civic_engagement": "high"}
            }),
        )]);
        let ctx = QueryContext::default();
        assert_eq!(diagnose("q", &output, &ctx), diagnose("q", &output, &ctx));
    }
}
