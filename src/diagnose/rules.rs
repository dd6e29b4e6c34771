// src/diagnose/rules.rs
//! Threshold rules over the extracted metrics: stress signals, assets, and
//! the overall severity verdict.
//!
//! Rules are ordered (predicate, producer) pairs evaluated against an
//! immutable metrics snapshot. Every rule is checked independently; adding a
//! rule is additive and does not touch its neighbors.

use serde::{Deserialize, Serialize};

use super::metrics::{HealthMetrics, VITALITY_HIGH};
use crate::payload::fmt_num;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Systemic,
    EnforcementOpportunity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressSignal {
    pub severity: Severity,
    pub domain: String,
    pub description: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub kind: String,
    pub description: String,
    pub opportunity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    #[serde(rename = "HEALTHY")]
    Healthy,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "STRESSED")]
    Stressed,
    #[serde(rename = "CRITICAL")]
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Maintenance,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub status: HealthStatus,
    pub summary: String,
    pub priority: Priority,
}

struct StressRule {
    applies: fn(&HealthMetrics) -> bool,
    produce: fn(&HealthMetrics) -> StressSignal,
}

fn service_resolution_rate(m: &HealthMetrics) -> Option<f64> {
    m.service_responsiveness.as_ref()?.resolution_rate
}

fn service_trend(m: &HealthMetrics) -> Option<(&str, f64)> {
    let trend = m.service_responsiveness.as_ref()?.trend.as_ref()?;
    Some((trend.direction.as_deref()?, trend.magnitude_percent?))
}

fn violation_burden(m: &HealthMetrics) -> Option<f64> {
    m.housing_quality.as_ref()?.violation_burden
}

fn problem_buildings(m: &HealthMetrics) -> Option<f64> {
    m.housing_quality.as_ref()?.problem_buildings
}

fn housing_trend(m: &HealthMetrics) -> Option<&str> {
    m.housing_quality.as_ref()?.trend.as_deref()
}

fn total_spending(m: &HealthMetrics) -> Option<f64> {
    m.resource_allocation.as_ref()?.total_spending
}

/// Ordered stress rule table. Templates are fixed; golden tests depend on
/// them verbatim.
const STRESS_RULES: &[StressRule] = &[
    StressRule {
        applies: |m| service_resolution_rate(m).is_some_and(|r| r < 50.0),
        produce: |m| StressSignal {
            severity: Severity::Critical,
            domain: "service_responsiveness".to_string(),
            description: format!(
                "Low resolution rate ({}%)",
                fmt_num(service_resolution_rate(m).unwrap_or_default())
            ),
            impact: "Citizens not getting help, eroding trust in government".to_string(),
        },
    },
    StressRule {
        applies: |m| {
            service_trend(m).is_some_and(|(dir, pct)| dir == "increasing" && pct > 20.0)
        },
        produce: |m| StressSignal {
            severity: Severity::Warning,
            domain: "service_demand".to_string(),
            description: format!(
                "Complaints increasing by {}%",
                fmt_num(service_trend(m).map(|(_, pct)| pct).unwrap_or_default())
            ),
            impact: "Worsening conditions or increased civic engagement".to_string(),
        },
    },
    StressRule {
        applies: |m| violation_burden(m).is_some_and(|r| r > 50.0),
        produce: |m| StressSignal {
            severity: Severity::Critical,
            domain: "housing_quality".to_string(),
            description: format!(
                "High violation rate ({}% open)",
                fmt_num(violation_burden(m).unwrap_or_default())
            ),
            impact: "Significant housing quality issues affecting residents".to_string(),
        },
    },
    StressRule {
        applies: |m| problem_buildings(m).is_some_and(|n| n > 10.0),
        produce: |m| StressSignal {
            severity: Severity::EnforcementOpportunity,
            domain: "housing_quality".to_string(),
            description: format!(
                "{} buildings with multiple violations",
                fmt_num(problem_buildings(m).unwrap_or_default())
            ),
            impact: "Concentrated landlord neglect - targeted enforcement could help many residents"
                .to_string(),
        },
    },
    StressRule {
        applies: |m| housing_trend(m) == Some("worsening"),
        produce: |_| StressSignal {
            severity: Severity::Warning,
            domain: "housing_trajectory".to_string(),
            description: "Housing complaints increasing".to_string(),
            impact: "Deteriorating housing conditions".to_string(),
        },
    },
    // Absolute spending threshold with no normalization by area size; kept
    // as-is, see DESIGN.md.
    StressRule {
        applies: |m| {
            violation_burden(m).is_some_and(|r| r > 40.0)
                && total_spending(m).is_some_and(|s| s < 1_000_000.0)
        },
        produce: |_| StressSignal {
            severity: Severity::Systemic,
            domain: "resource_mismatch".to_string(),
            description: "High housing needs but low city spending".to_string(),
            impact: "Resources not matching need - potential systemic neglect".to_string(),
        },
    },
];

pub fn stress_signals(metrics: &HealthMetrics) -> Vec<StressSignal> {
    STRESS_RULES
        .iter()
        .filter(|rule| (rule.applies)(metrics))
        .map(|rule| (rule.produce)(metrics))
        .collect()
}

struct AssetRule {
    applies: fn(&HealthMetrics) -> bool,
    produce: fn(&HealthMetrics) -> Asset,
}

fn civic_engagement(m: &HealthMetrics) -> Option<&str> {
    m.service_responsiveness.as_ref()?.civic_engagement.as_deref()
}

fn vitality_status(m: &HealthMetrics) -> Option<&str> {
    m.community_vitality.as_ref()?.status.as_deref()
}

const ASSET_RULES: &[AssetRule] = &[
    AssetRule {
        applies: |m| civic_engagement(m) == Some(VITALITY_HIGH),
        produce: |_| Asset {
            kind: "community_engagement".to_string(),
            description: "High 311 usage indicates engaged residents".to_string(),
            opportunity: "Leverage community organizing capacity for collective action".to_string(),
        },
    },
    AssetRule {
        applies: |m| vitality_status(m) == Some(VITALITY_HIGH),
        produce: |m| Asset {
            kind: "social_capital".to_string(),
            description: format!(
                "{} community events",
                fmt_num(
                    m.community_vitality
                        .as_ref()
                        .and_then(|v| v.event_count)
                        .unwrap_or_default()
                )
            ),
            opportunity:
                "Strong event-organizing infrastructure could be directed toward other community needs"
                    .to_string(),
        },
    },
    AssetRule {
        applies: |m| service_resolution_rate(m).is_some_and(|r| r > 70.0),
        produce: |m| Asset {
            kind: "effective_services".to_string(),
            description: format!(
                "{}% resolution rate",
                fmt_num(service_resolution_rate(m).unwrap_or_default())
            ),
            opportunity: "City agencies are responsive - residents can get help".to_string(),
        },
    },
    AssetRule {
        applies: |m| service_trend(m).is_some_and(|(dir, _)| dir == "decreasing"),
        produce: |_| Asset {
            kind: "positive_trajectory".to_string(),
            description: "Complaints decreasing over time".to_string(),
            opportunity: "Interventions are working - double down on what is effective".to_string(),
        },
    },
    AssetRule {
        applies: |m| housing_trend(m) == Some("improving"),
        produce: |_| Asset {
            kind: "housing_improvement".to_string(),
            description: "Housing complaints trending down".to_string(),
            opportunity: "Housing quality improving - identify what is working".to_string(),
        },
    },
];

pub fn assets(metrics: &HealthMetrics) -> Vec<Asset> {
    ASSET_RULES
        .iter()
        .filter(|rule| (rule.applies)(metrics))
        .map(|rule| (rule.produce)(metrics))
        .collect()
}

/// Strict ordered decision table over signal-severity counts; first match
/// wins. Systemic and enforcement-opportunity signals do not count toward
/// either bucket.
pub fn overall_assessment(signals: &[StressSignal]) -> OverallAssessment {
    let critical = signals
        .iter()
        .filter(|s| s.severity == Severity::Critical)
        .count();
    let warnings = signals
        .iter()
        .filter(|s| s.severity == Severity::Warning)
        .count();

    if critical > 1 {
        OverallAssessment {
            status: HealthStatus::Critical,
            summary: "Multiple critical stress signals - immediate intervention needed".to_string(),
            priority: Priority::High,
        }
    } else if critical == 1 || warnings > 2 {
        OverallAssessment {
            status: HealthStatus::Stressed,
            summary: "Significant concerns that need attention".to_string(),
            priority: Priority::Medium,
        }
    } else if warnings > 0 {
        OverallAssessment {
            status: HealthStatus::Moderate,
            summary: "Some concerns but generally manageable".to_string(),
            priority: Priority::Low,
        }
    } else {
        OverallAssessment {
            status: HealthStatus::Healthy,
            summary: "No major concerns, systems functioning well".to_string(),
            priority: Priority::Maintenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnose::metrics::{
        CommunityVitality, HousingQuality, ResourceAllocation, ServiceResponsiveness, TrendInfo,
    };

    fn service(rate: f64) -> ServiceResponsiveness {
        ServiceResponsiveness {
            resolution_rate: Some(rate),
            avg_response_time: None,
            trend: None,
            status: None,
            civic_engagement: None,
        }
    }

    fn housing(burden: f64) -> HousingQuality {
        HousingQuality {
            violation_burden: Some(burden),
            complaint_resolution: None,
            trend: None,
            problem_buildings: None,
            status: None,
        }
    }

    #[test]
    fn low_resolution_rate_is_critical() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(45.0)),
            ..Default::default()
        };
        let signals = stress_signals(&metrics);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::Critical);
        assert_eq!(signals[0].description, "Low resolution rate (45%)");
    }

    #[test]
    fn boundary_values_do_not_trigger() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(50.0)),
            housing_quality: Some(housing(50.0)),
            ..Default::default()
        };
        assert!(stress_signals(&metrics).is_empty());
    }

    #[test]
    fn complaint_surge_needs_more_than_twenty_percent() {
        let mut sr = service(60.0);
        sr.trend = Some(TrendInfo {
            direction: Some("increasing".to_string()),
            magnitude_percent: Some(20.0),
        });
        let at_boundary = HealthMetrics {
            service_responsiveness: Some(sr.clone()),
            ..Default::default()
        };
        assert!(stress_signals(&at_boundary).is_empty());

        sr.trend.as_mut().unwrap().magnitude_percent = Some(21.0);
        let above = HealthMetrics {
            service_responsiveness: Some(sr),
            ..Default::default()
        };
        let signals = stress_signals(&above);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].domain, "service_demand");
        assert_eq!(signals[0].description, "Complaints increasing by 21%");
    }

    #[test]
    fn resource_mismatch_requires_both_conditions() {
        let metrics = HealthMetrics {
            housing_quality: Some(housing(45.0)),
            resource_allocation: Some(ResourceAllocation {
                total_spending: Some(500_000.0),
                spending_count: Some(10.0),
                avg_transaction: Some(50_000.0),
            }),
            ..Default::default()
        };
        let signals = stress_signals(&metrics);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::Systemic);
        assert_eq!(signals[0].domain, "resource_mismatch");

        // Spending alone does not trigger without the violation burden.
        let spending_only = HealthMetrics {
            resource_allocation: metrics.resource_allocation.clone(),
            ..Default::default()
        };
        assert!(stress_signals(&spending_only).is_empty());
    }

    #[test]
    fn assets_for_healthy_area() {
        let mut sr = service(80.0);
        sr.civic_engagement = Some("high".to_string());
        sr.trend = Some(TrendInfo {
            direction: Some("decreasing".to_string()),
            magnitude_percent: Some(5.0),
        });
        let metrics = HealthMetrics {
            service_responsiveness: Some(sr),
            community_vitality: Some(CommunityVitality {
                event_count: Some(30.0),
                event_diversity: Some(6.0),
                status: Some("high".to_string()),
            }),
            ..Default::default()
        };
        let found = assets(&metrics);
        let kinds: Vec<&str> = found.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "community_engagement",
                "social_capital",
                "effective_services",
                "positive_trajectory"
            ]
        );
    }

    #[test]
    fn assessment_decision_table_boundaries() {
        let critical = |n: usize| {
            (0..n)
                .map(|_| StressSignal {
                    severity: Severity::Critical,
                    domain: "d".to_string(),
                    description: "x".to_string(),
                    impact: "y".to_string(),
                })
                .collect::<Vec<_>>()
        };
        let warnings = |n: usize| {
            (0..n)
                .map(|_| StressSignal {
                    severity: Severity::Warning,
                    domain: "d".to_string(),
                    description: "x".to_string(),
                    impact: "y".to_string(),
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(overall_assessment(&critical(2)).status, HealthStatus::Critical);
        assert_eq!(overall_assessment(&critical(1)).status, HealthStatus::Stressed);
        assert_eq!(overall_assessment(&warnings(3)).status, HealthStatus::Stressed);
        // Exactly two warnings stay MODERATE, not STRESSED.
        assert_eq!(overall_assessment(&warnings(2)).status, HealthStatus::Moderate);
        assert_eq!(overall_assessment(&warnings(1)).status, HealthStatus::Moderate);
        assert_eq!(overall_assessment(&[]).status, HealthStatus::Healthy);
        assert_eq!(overall_assessment(&[]).priority, Priority::Maintenance);
    }

    #[test]
    fn systemic_signals_do_not_affect_assessment_counts() {
        let signals = vec![StressSignal {
            severity: Severity::Systemic,
            domain: "resource_mismatch".to_string(),
            description: "x".to_string(),
            impact: "y".to_string(),
        }];
        assert_eq!(overall_assessment(&signals).status, HealthStatus::Healthy);
    }
}
