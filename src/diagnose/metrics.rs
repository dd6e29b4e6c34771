// src/diagnose/metrics.rs
//! Health-metric extraction: scan raw results for known (source, payload
//! shape) pairs and fill the fixed five-slot metrics record. A slot stays
//! `None` when its source is absent from the batch; a present payload with
//! missing nested fields fills the slot with `None` leaves.

use serde::{Deserialize, Serialize};

use crate::dispatch::RawResult;
use crate::payload::{get, get_array, get_f64, get_str};

pub const VITALITY_HIGH: &str = "high";
pub const VITALITY_MODERATE: &str = "moderate";
pub const VITALITY_LOW: &str = "low";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendInfo {
    pub direction: Option<String>,
    pub magnitude_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponsiveness {
    pub resolution_rate: Option<f64>,
    pub avg_response_time: Option<f64>,
    pub trend: Option<TrendInfo>,
    pub status: Option<String>,
    pub civic_engagement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingQuality {
    /// Percentage of violations still open.
    pub violation_burden: Option<f64>,
    pub complaint_resolution: Option<f64>,
    /// "improving" | "worsening" | "stable".
    pub trend: Option<String>,
    pub problem_buildings: Option<f64>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infrastructure {
    pub closure_count: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityVitality {
    pub event_count: Option<f64>,
    pub event_diversity: Option<f64>,
    /// Derived: >20 events "high", >10 "moderate", else "low".
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub total_spending: Option<f64>,
    pub spending_count: Option<f64>,
    pub avg_transaction: Option<f64>,
}

/// Fixed-shape record; `None` means "unknown", never "zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub service_responsiveness: Option<ServiceResponsiveness>,
    pub housing_quality: Option<HousingQuality>,
    pub infrastructure: Option<Infrastructure>,
    pub community_vitality: Option<CommunityVitality>,
    pub resource_allocation: Option<ResourceAllocation>,
}

pub fn extract(results: &[RawResult]) -> HealthMetrics {
    let mut metrics = HealthMetrics::default();

    for result in results {
        let Some(data) = &result.payload else {
            continue;
        };

        match result.source.as_str() {
            // 311 health payloads announce themselves via `health_signals`.
            "nyc-311" if get(data, &["health_signals"]).is_some() => {
                metrics.service_responsiveness = Some(ServiceResponsiveness {
                    resolution_rate: get_f64(data, &["resolution_rate"]),
                    avg_response_time: get_f64(data, &["avg_resolution_days"]),
                    trend: get(data, &["trend"]).map(|t| TrendInfo {
                        direction: get_str(t, &["direction"]).map(str::to_string),
                        magnitude_percent: get_f64(t, &["magnitude_percent"]),
                    }),
                    status: get_str(data, &["health_signals", "service_responsiveness"])
                        .map(str::to_string),
                    civic_engagement: get_str(data, &["health_signals", "civic_engagement"])
                        .map(str::to_string),
                });
            }
            "nyc-hpd" if get(data, &["health_assessment"]).is_some() => {
                metrics.housing_quality = Some(HousingQuality {
                    violation_burden: get_f64(data, &["violations", "open_rate"]),
                    complaint_resolution: get_f64(data, &["complaints", "resolution_rate"]),
                    trend: get_str(data, &["trend", "direction"]).map(str::to_string),
                    problem_buildings: get_f64(data, &["problem_buildings", "count"]),
                    status: get_str(data, &["health_assessment", "overall"]).map(str::to_string),
                });
            }
            "nyc-comptroller" if get(data, &["total_spending"]).is_some() => {
                let total = get_f64(data, &["total_spending"]);
                let count = get_f64(data, &["count"]);
                let avg = match (total, count) {
                    (Some(t), Some(c)) if c > 0.0 => Some(t / c),
                    _ => None,
                };
                metrics.resource_allocation = Some(ResourceAllocation {
                    total_spending: total,
                    spending_count: count,
                    avg_transaction: avg,
                });
            }
            "nyc-events" if get(data, &["total_events"]).is_some() => {
                let count = get_f64(data, &["total_events"]);
                let status = count.map(|n| {
                    if n > 20.0 {
                        VITALITY_HIGH
                    } else if n > 10.0 {
                        VITALITY_MODERATE
                    } else {
                        VITALITY_LOW
                    }
                    .to_string()
                });
                metrics.community_vitality = Some(CommunityVitality {
                    event_count: count,
                    event_diversity: get_array(data, &["by_type"]).map(|a| a.len() as f64),
                    status,
                });
            }
            "nyc-dot" if get(data, &["closures"]).is_some() => {
                metrics.infrastructure = Some(Infrastructure {
                    closure_count: get_f64(data, &["count"])
                        .or_else(|| get_array(data, &["closures"]).map(|a| a.len() as f64)),
                });
            }
            _ => {}
        }
    }

    metrics
}
