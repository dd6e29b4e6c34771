// src/synthesize.rs
//! Synthesis of heterogeneous tool results into one narrative answer.
//!
//! Summaries and insights are per-(source, operation) templates over the raw
//! JSON payloads; unknown combinations degrade to a generic line instead of
//! failing. The correlation pass is a closed, ordered rule table over pairs
//! of result types; every rule is evaluated, none short-circuits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::RawResult;
use crate::payload::{fmt_money, fmt_num, fmt_opt, get, get_f64, get_str};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    SingleSource,
    MultiSource,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

/// Free-form classification tag plus message; new kinds may be added without
/// breaking consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub kind: String,
    pub message: String,
    pub strength: Strength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub summary: String,
    pub insights: Vec<Insight>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlations: Vec<Correlation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<String>,
    pub query_type: QueryType,
}

impl Synthesis {
    fn empty() -> Self {
        Self {
            summary: "No results found".to_string(),
            insights: Vec::new(),
            correlations: Vec::new(),
            data_sources: Vec::new(),
            query_type: QueryType::None,
        }
    }
}

// --- per-result summaries ---

/// One-line summary for a single result. Total over all known
/// (source, operation) pairs and degrades to a generic line otherwise.
pub fn summarize_result(result: &RawResult) -> String {
    let Some(data) = &result.payload else {
        return format!("{} returned no results", result.source);
    };

    match (result.source.as_str(), result.operation.as_str()) {
        ("nyc-311", "search_complaints") => {
            format!("Found {} 311 complaints", fmt_opt(get_f64(data, &["count"])))
        }
        ("nyc-311", "get_response_times") => format!(
            "Average response time: {} hours",
            get_f64(data, &["summary", "average_hours"])
                .map(|h| format!("{h:.1}"))
                .unwrap_or_else(|| "unknown".to_string())
        ),
        ("nyc-311", "analyze_trends") => format!(
            "311 complaints are {} by {}%",
            get_str(data, &["trend", "direction"]).unwrap_or("unchanged"),
            fmt_opt(get_f64(data, &["trend", "percentage_change"]).map(f64::abs))
        ),
        ("nyc-311", "get_neighborhood_health") => format!(
            "311 resolution rate: {}%",
            fmt_opt(get_f64(data, &["resolution_rate"]))
        ),
        ("nyc-dob", "search_violations") => {
            format!("Found {} DOB violations", fmt_opt(get_f64(data, &["count"])))
        }
        ("nyc-dob", "search_permits") => {
            format!("Found {} building permits", fmt_opt(get_f64(data, &["count"])))
        }
        ("nyc-dob", "get_construction_activity") => format!(
            "{} construction permits filed",
            fmt_opt(get_f64(data, &["total_permits"]))
        ),
        ("nyc-property", "get_sales_history") => format!(
            "{} property sales, median price: ${}",
            fmt_opt(get_f64(data, &["count"])),
            get_f64(data, &["statistics", "median_price"])
                .map(fmt_money)
                .unwrap_or_else(|| "unknown".to_string())
        ),
        ("nyc-property", "search_properties") => {
            format!("Found {} properties", fmt_opt(get_f64(data, &["count"])))
        }
        ("nyc-hpd", "search_violations") => format!(
            "Found {} housing violations",
            fmt_opt(get_f64(data, &["count"]))
        ),
        ("nyc-hpd", "search_complaints") => format!(
            "Found {} housing complaints",
            fmt_opt(get_f64(data, &["count"]))
        ),
        ("nyc-hpd", "get_housing_health") => format!(
            "Housing health assessment: {}",
            get_str(data, &["health_assessment", "overall"]).unwrap_or("unknown")
        ),
        ("nyc-events", "search_events") | ("nyc-events", "get_upcoming_events") => {
            format!("Found {} events", fmt_opt(get_f64(data, &["count"])))
        }
        ("nyc-comptroller", "search_spending") => format!(
            "City spending: ${} across {} transactions",
            get_f64(data, &["total_spending"])
                .map(fmt_money)
                .unwrap_or_else(|| "unknown".to_string()),
            fmt_opt(get_f64(data, &["count"]))
        ),
        ("nyc-comptroller", "search_contracts") => {
            format!("Found {} contracts", fmt_opt(get_f64(data, &["count"])))
        }
        ("nyc-dot", "search_street_closures") => format!(
            "Found {} street closures",
            fmt_opt(get_f64(data, &["count"]))
        ),
        ("nyc-dot", "get_parking_violations") => format!(
            "Found {} parking violations",
            fmt_opt(get_f64(data, &["count"]))
        ),
        _ => format!("{} returned data", result.source),
    }
}

// --- per-result insights ---

fn insights_for(result: &RawResult) -> Vec<Insight> {
    let mut insights = Vec::new();
    let Some(data) = &result.payload else {
        return insights;
    };

    match (result.source.as_str(), result.operation.as_str()) {
        ("nyc-311", "get_response_times") => {
            // by_complaint_type is ordered fastest-first by the source.
            if let Some(rows) = get(data, &["by_complaint_type"]).and_then(Value::as_array) {
                let fastest = rows.first();
                let slowest = rows.last();
                if let Some(f) = fastest {
                    if let (Some(kind), Some(hours)) =
                        (get_str(f, &["complaint_type"]), get_f64(f, &["avg_hours"]))
                    {
                        insights.push(Insight {
                            kind: "fastest_response".to_string(),
                            message: format!("Fastest response: {kind} ({hours:.1} hours)"),
                        });
                    }
                }
                if rows.len() > 1 {
                    if let Some(s) = slowest {
                        if let (Some(kind), Some(hours)) =
                            (get_str(s, &["complaint_type"]), get_f64(s, &["avg_hours"]))
                        {
                            insights.push(Insight {
                                kind: "slowest_response".to_string(),
                                message: format!("Slowest response: {kind} ({hours:.1} hours)"),
                            });
                        }
                    }
                }
            }
        }
        ("nyc-311", "analyze_trends") => {
            if let (Some(direction), Some(pct)) = (
                get_str(data, &["trend", "direction"]),
                get_f64(data, &["trend", "percentage_change"]),
            ) {
                insights.push(Insight {
                    kind: "trend".to_string(),
                    message: format!("Complaints are {direction} by {}%", fmt_num(pct.abs())),
                });
            }
        }
        ("nyc-dob", "get_construction_activity") => {
            if let Some(top) = get(data, &["by_borough"])
                .and_then(Value::as_array)
                .and_then(|rows| rows.first())
            {
                if let (Some(borough), Some(count)) =
                    (get_str(top, &["borough"]), get_f64(top, &["count"]))
                {
                    insights.push(Insight {
                        kind: "construction_hotspot".to_string(),
                        message: format!(
                            "Most construction activity in {borough} ({} permits)",
                            fmt_num(count)
                        ),
                    });
                }
            }
        }
        ("nyc-property", "get_sales_history") => {
            if let (Some(avg), Some(median)) = (
                get_f64(data, &["statistics", "average_price"]),
                get_f64(data, &["statistics", "median_price"]),
            ) {
                if median != 0.0 {
                    let diff = (avg - median) / median * 100.0;
                    let side = if diff > 0.0 { "above" } else { "below" };
                    let spread = if diff.abs() > 20.0 {
                        "high-value outliers"
                    } else {
                        "balanced distribution"
                    };
                    insights.push(Insight {
                        kind: "price_distribution".to_string(),
                        message: format!(
                            "Average price is {diff:.1}% {side} median, suggesting {spread}"
                        ),
                    });
                }
            }
        }
        _ => {}
    }

    insights
}

// --- correlation rules ---

struct CorrelationRule {
    kind: &'static str,
    strength: Strength,
    left: fn(&RawResult) -> bool,
    right: fn(&RawResult) -> bool,
    message: fn(&RawResult, &RawResult) -> String,
}

/// Closed, ordered rule set. Each rule fires when both of its result types
/// are present in the batch.
const CORRELATION_RULES: &[CorrelationRule] = &[
    CorrelationRule {
        kind: "complaint_violation_correlation",
        strength: Strength::Moderate,
        left: |r| r.source == "nyc-311",
        right: |r| r.source == "nyc-dob" && r.operation == "search_violations",
        message: |left, right| {
            format!(
                "Area has both 311 complaints ({}) and DOB violations ({})",
                fmt_opt(left.payload.as_ref().and_then(|d| get_f64(d, &["count"]))),
                fmt_opt(right.payload.as_ref().and_then(|d| get_f64(d, &["count"])))
            )
        },
    },
    CorrelationRule {
        kind: "construction_sales_correlation",
        strength: Strength::Moderate,
        left: |r| r.source == "nyc-dob" && r.operation == "get_construction_activity",
        right: |r| r.source == "nyc-property" && r.operation == "get_sales_history",
        message: |left, right| {
            format!(
                "{} construction permits with {} recent sales in area",
                fmt_opt(left.payload.as_ref().and_then(|d| get_f64(d, &["total_permits"]))),
                fmt_opt(right.payload.as_ref().and_then(|d| get_f64(d, &["count"])))
            )
        },
    },
];

fn find_correlations(successes: &[&RawResult]) -> Vec<Correlation> {
    let mut correlations = Vec::new();
    for rule in CORRELATION_RULES {
        let left = successes.iter().find(|r| (rule.left)(r));
        let right = successes.iter().find(|r| (rule.right)(r));
        if let (Some(left), Some(right)) = (left, right) {
            correlations.push(Correlation {
                kind: rule.kind.to_string(),
                message: (rule.message)(left, right),
                strength: rule.strength,
            });
        }
    }
    correlations
}

/// Merge a batch of raw results into a synthesis. Failed results contribute
/// their source name to `data_sources` but nothing else.
pub fn synthesize(results: &[RawResult]) -> Synthesis {
    let successes: Vec<&RawResult> = results.iter().filter(|r| r.is_success()).collect();

    if successes.is_empty() {
        return Synthesis::empty();
    }

    let mut data_sources: Vec<String> = Vec::new();
    for r in results {
        if !data_sources.iter().any(|s| s == &r.source) {
            data_sources.push(r.source.clone());
        }
    }

    if successes.len() == 1 {
        let result = successes[0];
        return Synthesis {
            summary: summarize_result(result),
            insights: insights_for(result),
            correlations: Vec::new(),
            data_sources,
            query_type: QueryType::SingleSource,
        };
    }

    let summaries: Vec<String> = successes.iter().map(|r| summarize_result(r)).collect();
    let insights: Vec<Insight> = successes.iter().flat_map(|r| insights_for(r)).collect();
    let correlations = find_correlations(&successes);

    Synthesis {
        summary: format!(
            "Analyzed data from {} sources: {}",
            successes.len(),
            summaries.join("; ")
        ),
        insights,
        correlations,
        data_sources,
        query_type: QueryType::MultiSource,
    }
}
