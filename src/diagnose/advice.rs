// src/diagnose/advice.rs
//! Possibilities and suggestions: pattern-match the already-computed signal
//! and asset lists, then map possibility categories to audience-bucketed
//! suggestion templates. Labels are fixed per rule, not computed scores.

use serde::{Deserialize, Serialize};

use super::metrics::HealthMetrics;
use super::rules::{Asset, Severity, StressSignal};
use crate::payload::fmt_num;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Possibility {
    pub category: String,
    pub idea: String,
    pub impact: Rating,
    pub feasibility: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub expected_impact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub for_government: Vec<Suggestion>,
    pub for_community: Vec<Suggestion>,
    pub for_policy: Vec<Suggestion>,
}

fn has_asset(assets: &[Asset], kind: &str) -> bool {
    assets.iter().any(|a| a.kind == kind)
}

pub fn possibilities(
    metrics: &HealthMetrics,
    signals: &[StressSignal],
    assets: &[Asset],
) -> Vec<Possibility> {
    let mut out = Vec::new();

    if signals
        .iter()
        .any(|s| s.severity == Severity::EnforcementOpportunity)
    {
        let buildings = metrics
            .housing_quality
            .as_ref()
            .and_then(|h| h.problem_buildings)
            .unwrap_or_default();
        out.push(Possibility {
            category: "targeted_enforcement".to_string(),
            idea: format!(
                "Focusing housing enforcement on {} problem buildings could improve conditions for hundreds of residents",
                fmt_num(buildings)
            ),
            impact: Rating::High,
            feasibility: Rating::High,
        });
    }

    if has_asset(assets, "community_engagement") && has_asset(assets, "social_capital") {
        out.push(Possibility {
            category: "community_organizing".to_string(),
            idea: "The organizing capacity that produces community events could be directed toward tenant advocacy and collective action".to_string(),
            impact: Rating::High,
            feasibility: Rating::Moderate,
        });
    }

    if signals.iter().any(|s| s.domain == "resource_mismatch") {
        out.push(Possibility {
            category: "resource_allocation".to_string(),
            idea: "City spending could be redirected to match demonstrated need in this area"
                .to_string(),
            impact: Rating::High,
            feasibility: Rating::Moderate,
        });
    }

    if has_asset(assets, "positive_trajectory") {
        out.push(Possibility {
            category: "scale_success".to_string(),
            idea: "Identify what interventions are working here and apply them elsewhere"
                .to_string(),
            impact: Rating::Moderate,
            feasibility: Rating::High,
        });
    }

    out
}

/// Closed category→template table plus one policy suggestion per systemic
/// signal.
pub fn suggestions(
    metrics: &HealthMetrics,
    signals: &[StressSignal],
    possibilities: &[Possibility],
) -> Suggestions {
    let mut out = Suggestions::default();

    for p in possibilities {
        match p.category.as_str() {
            "targeted_enforcement" => {
                let buildings = metrics
                    .housing_quality
                    .as_ref()
                    .and_then(|h| h.problem_buildings)
                    .unwrap_or_default();
                out.for_government.push(Suggestion {
                    action: "Launch coordinated housing enforcement campaign".to_string(),
                    detail: Some(format!(
                        "{} buildings with multiple violations",
                        fmt_num(buildings)
                    )),
                    expected_impact: "Improve conditions for residents, send signal to bad landlords"
                        .to_string(),
                });
            }
            "resource_allocation" => {
                out.for_government.push(Suggestion {
                    action: "Increase housing program funding for this area".to_string(),
                    detail: Some("Data shows high need relative to current spending".to_string()),
                    expected_impact: "Better match resources to need".to_string(),
                });
            }
            "community_organizing" => {
                out.for_community.push(Suggestion {
                    action: "Form tenant associations in problem buildings".to_string(),
                    detail: Some(
                        "Existing organizing capacity from community events".to_string(),
                    ),
                    expected_impact: "Collective advocacy for better conditions".to_string(),
                });
            }
            _ => {}
        }
    }

    for signal in signals {
        if signal.severity == Severity::Systemic {
            out.for_policy.push(Suggestion {
                action: "Review resource allocation formulas to ensure equity".to_string(),
                detail: Some(signal.description.clone()),
                expected_impact: "High needs areas receiving disproportionately low investment"
                    .to_string(),
            });
        }
    }

    out
}
