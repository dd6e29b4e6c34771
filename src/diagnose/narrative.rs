// src/diagnose/narrative.rs
//! Deterministic narrative text over the extracted metrics: a "what the
//! data shows" block for every present slot, then a "what this means"
//! interpretation from a fixed decision table. No clock, no randomness;
//! identical inputs produce byte-identical text.

use super::metrics::{HealthMetrics, VITALITY_LOW};
use crate::payload::fmt_num;

pub fn generate(metrics: &HealthMetrics) -> String {
    let mut narrative = String::new();

    narrative.push_str("WHAT THE DATA SHOWS:\n");

    if let Some(service) = &metrics.service_responsiveness {
        narrative.push_str(&format!(
            "Service requests are being resolved at {}% ({}). ",
            fmt_num(service.resolution_rate.unwrap_or_default()),
            service.status.as_deref().unwrap_or("unknown")
        ));
        narrative.push_str(&format!(
            "Civic engagement is {}. ",
            service.civic_engagement.as_deref().unwrap_or("unknown")
        ));
        if let Some(trend) = &service.trend {
            narrative.push_str(&format!(
                "Complaints are {} by {}%. ",
                trend.direction.as_deref().unwrap_or("unchanged"),
                fmt_num(trend.magnitude_percent.unwrap_or_default())
            ));
        }
        narrative.push_str("\n\n");
    }

    if let Some(housing) = &metrics.housing_quality {
        narrative.push_str(&format!(
            "Housing quality shows {}% open violations. ",
            fmt_num(housing.violation_burden.unwrap_or_default())
        ));
        if housing.problem_buildings.unwrap_or_default() > 0.0 {
            narrative.push_str(&format!(
                "{} buildings have concentrated issues (potential bad landlords). ",
                fmt_num(housing.problem_buildings.unwrap_or_default())
            ));
        }
        narrative.push_str(&format!(
            "Overall housing status: {}.\n\n",
            housing.status.as_deref().unwrap_or("unknown")
        ));
    }

    if let Some(infra) = &metrics.infrastructure {
        if let Some(closures) = infra.closure_count {
            narrative.push_str(&format!(
                "Infrastructure shows {} active street closures.\n\n",
                fmt_num(closures)
            ));
        }
    }

    if let Some(vitality) = &metrics.community_vitality {
        narrative.push_str(&format!(
            "Community shows {} vitality with {} events.\n\n",
            vitality.status.as_deref().unwrap_or("unknown"),
            fmt_num(vitality.event_count.unwrap_or_default())
        ));
    }

    narrative.push_str("WHAT THIS MEANS:\n");
    narrative.push_str(&interpret(metrics));

    narrative
}

/// Fixed interpretation decision table over three derived booleans plus two
/// simultaneous-trajectory pattern checks.
fn interpret(metrics: &HealthMetrics) -> String {
    let mut interpretation = String::new();

    let housing_healthy = metrics
        .housing_quality
        .as_ref()
        .and_then(|h| h.violation_burden)
        .is_some_and(|r| r < 30.0);
    let services_responsive = metrics
        .service_responsiveness
        .as_ref()
        .and_then(|s| s.resolution_rate)
        .is_some_and(|r| r > 70.0);
    // Absence of vitality data means unknown, not engaged.
    let community_engaged = metrics
        .community_vitality
        .as_ref()
        .and_then(|v| v.status.as_deref())
        .is_some_and(|s| s != VITALITY_LOW);

    if housing_healthy && services_responsive {
        interpretation.push_str(
            "This area shows signs of health: housing is well-maintained and city services are responsive. ",
        );
    } else if !housing_healthy && !services_responsive {
        interpretation.push_str(
            "This area shows systemic stress: housing quality needs attention AND services are struggling to keep up. ",
        );
    } else if !housing_healthy && services_responsive {
        interpretation.push_str(
            "Mixed signals: housing quality is concerning but city services are responding. May indicate recent deterioration or transition. ",
        );
    }

    if community_engaged {
        interpretation.push_str("High community engagement is an asset that could be leveraged. ");
    }

    let service_direction = metrics
        .service_responsiveness
        .as_ref()
        .and_then(|s| s.trend.as_ref())
        .and_then(|t| t.direction.as_deref());
    let housing_direction = metrics
        .housing_quality
        .as_ref()
        .and_then(|h| h.trend.as_deref());

    if service_direction == Some("increasing") && housing_direction == Some("worsening") {
        interpretation.push_str(
            "\n\nCONCERNING PATTERN: Both service complaints AND housing issues are increasing, suggesting systemic deterioration. ",
        );
    }

    if service_direction == Some("decreasing") && housing_direction == Some("improving") {
        interpretation.push_str(
            "\n\nPOSITIVE TRAJECTORY: Both complaints and housing issues are improving - interventions are working. ",
        );
    }

    interpretation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnose::metrics::{HousingQuality, ServiceResponsiveness, TrendInfo};

    fn service(rate: f64) -> ServiceResponsiveness {
        ServiceResponsiveness {
            resolution_rate: Some(rate),
            avg_response_time: None,
            trend: None,
            status: Some("moderate".to_string()),
            civic_engagement: Some("high".to_string()),
        }
    }

    fn housing(burden: f64, trend: Option<&str>) -> HousingQuality {
        HousingQuality {
            violation_burden: Some(burden),
            complaint_resolution: None,
            trend: trend.map(str::to_string),
            problem_buildings: None,
            status: Some("stressed".to_string()),
        }
    }

    #[test]
    fn narrative_always_has_both_blocks() {
        let text = generate(&HealthMetrics::default());
        assert!(text.starts_with("WHAT THE DATA SHOWS:\n"));
        assert!(text.contains("WHAT THIS MEANS:\n"));
    }

    #[test]
    fn healthy_combination_reads_positive() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(80.0)),
            housing_quality: Some(housing(20.0, None)),
            ..Default::default()
        };
        let text = generate(&metrics);
        assert!(text.contains("This area shows signs of health"));
    }

    #[test]
    fn double_failure_reads_systemic() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(40.0)),
            housing_quality: Some(housing(60.0, None)),
            ..Default::default()
        };
        let text = generate(&metrics);
        assert!(text.contains("This area shows systemic stress"));
    }

    #[test]
    fn mixed_case_flags_transition() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(80.0)),
            housing_quality: Some(housing(60.0, None)),
            ..Default::default()
        };
        let text = generate(&metrics);
        assert!(text.contains("Mixed signals"));
    }

    #[test]
    fn concerning_pattern_requires_both_trajectories() {
        let mut sr = service(60.0);
        sr.trend = Some(TrendInfo {
            direction: Some("increasing".to_string()),
            magnitude_percent: Some(30.0),
        });
        let metrics = HealthMetrics {
            service_responsiveness: Some(sr),
            housing_quality: Some(housing(45.0, Some("worsening"))),
            ..Default::default()
        };
        let text = generate(&metrics);
        assert!(text.contains("CONCERNING PATTERN"));
        assert!(!text.contains("POSITIVE TRAJECTORY"));
    }

    #[test]
    fn absent_vitality_is_not_engagement() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(80.0)),
            ..Default::default()
        };
        let text = generate(&metrics);
        assert!(!text.contains("High community engagement"));
    }

    #[test]
    fn narrative_is_idempotent() {
        let metrics = HealthMetrics {
            service_responsiveness: Some(service(55.0)),
            housing_quality: Some(housing(35.0, Some("improving"))),
            ..Default::default()
        };
        assert_eq!(generate(&metrics), generate(&metrics));
    }
}
