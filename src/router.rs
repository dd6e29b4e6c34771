// src/router.rs
//! Relevance router: scores each registry entry against a free-text query,
//! selects the sources to consult, picks one operation per selected source
//! from its declarative rule table, and extracts shared call parameters.
//!
//! Scoring and explanation are independent pure functions over the same
//! inputs; `route` only assembles their outputs. Routing is heuristic by
//! design: two syntactically different queries are not guaranteed to route
//! identically.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::{Registry, SourceDescriptor};

/// Fixed borough vocabulary. First match *in this list order* wins, even when
/// another borough appears earlier in the query text.
const BOROUGHS: &[&str] = &["manhattan", "brooklyn", "queens", "bronx", "staten island"];

/// Day-range phrases, scanned in listed order.
const DAY_RANGES: &[(&str, u32)] = &[("last week", 7), ("last month", 30), ("last year", 365)];

/// Common complaint-type vocabulary; first match wins, value is uppercased
/// to match the upstream datasets.
const COMPLAINT_TYPES: &[&str] = &[
    "noise",
    "heat",
    "water",
    "garbage",
    "parking",
    "graffiti",
    "pothole",
    "street condition",
];

/// Structured overrides supplied alongside the query. These always take
/// precedence over values inferred from the query text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub borough: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Parameters shared by every tool call built for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borough: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complaint_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// One operation invocation against one source. The router emits exactly one
/// call per selected source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub source: String,
    pub operation: String,
    pub params: CallParams,
}

/// A source chosen for a query, with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSelection {
    pub name: String,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub selections: Vec<SourceSelection>,
    pub calls: Vec<ToolCall>,
    pub reasoning: Vec<String>,
}

/// Relevance of one descriptor to a (lowercased) query:
/// +1 per keyword substring, +2 per capability substring, +0.5 per
/// description word longer than 3 chars found in the query.
pub fn score(query: &str, source: &SourceDescriptor) -> f32 {
    let mut score = 0.0f32;

    for keyword in &source.keywords {
        if query.contains(&keyword.to_lowercase()) {
            score += 1.0;
        }
    }

    for capability in &source.capabilities {
        if query.contains(&capability.to_lowercase()) {
            score += 2.0;
        }
    }

    for word in source.description.to_lowercase().split_whitespace() {
        if word.len() > 3 && query.contains(word) {
            score += 0.5;
        }
    }

    score
}

/// Human-readable justification for selecting `source`, independent of the
/// numeric score.
pub fn explain(query: &str, source: &SourceDescriptor) -> String {
    let matched: Vec<&str> = source
        .keywords
        .iter()
        .filter(|k| query.contains(&k.to_lowercase()))
        .map(|k| k.as_str())
        .collect();
    if matched.is_empty() {
        "General relevance to query".to_string()
    } else {
        format!("Matched keywords: {}", matched.join(", "))
    }
}

/// Pick the operation for a selected source: first rule whose keywords match
/// the query, else the source's default.
fn select_operation<'a>(query: &str, source: &'a SourceDescriptor) -> &'a str {
    for rule in &source.operations {
        if rule
            .keywords
            .iter()
            .any(|k| query.contains(&k.to_lowercase()))
        {
            return &rule.operation;
        }
    }
    &source.default_operation
}

/// Extract shared parameters from the query text, then apply context
/// overrides. Text scanning uses fixed vocabularies in listed order; a query
/// naming several boroughs resolves to the first in `BOROUGHS`, which is a
/// deliberate tie-break.
pub fn extract_params(query: &str, context: &QueryContext) -> CallParams {
    let mut params = CallParams::default();

    for borough in BOROUGHS {
        if query.contains(borough) {
            params.borough = Some((*borough).to_string());
            break;
        }
    }

    for (phrase, days) in DAY_RANGES {
        if query.contains(phrase) {
            params.days = Some(*days);
            break;
        }
    }

    for complaint in COMPLAINT_TYPES {
        if query.contains(complaint) {
            params.complaint_type = Some(complaint.to_uppercase());
            break;
        }
    }

    if let Some(b) = &context.borough {
        params.borough = Some(b.clone());
    }
    if let Some(d) = context.days {
        params.days = Some(d);
    }
    if let Some(l) = context.limit {
        params.limit = Some(l);
    }

    params
}

/// Route a query: score every registry entry, select the ones that score
/// above zero (stable-sorted by descending score), and build one tool call
/// per selection. When nothing scores, fall back to the registry's default
/// source so the pipeline always has at least one source to consult.
pub fn route(query: &str, registry: &Registry, context: &QueryContext) -> RoutingResult {
    let query_lower = query.to_lowercase();
    let params = extract_params(&query_lower, context);

    let mut scored: Vec<(&SourceDescriptor, f32)> = Vec::new();
    for source in &registry.sources {
        let s = score(&query_lower, source);
        if s > 0.0 {
            scored.push((source, s));
        }
    }

    // Vec::sort_by is stable: equal scores keep registry order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut selections = Vec::with_capacity(scored.len());
    let mut calls = Vec::with_capacity(scored.len());
    let mut reasoning = Vec::with_capacity(scored.len());

    for (source, s) in &scored {
        selections.push(SourceSelection {
            name: source.name.clone(),
            relevance_score: *s,
        });
        calls.push(ToolCall {
            source: source.name.clone(),
            operation: select_operation(&query_lower, source).to_string(),
            params: params.clone(),
        });
        reasoning.push(format!(
            "{} (score: {}): {}",
            source.name,
            s,
            explain(&query_lower, source)
        ));
    }

    if selections.is_empty() {
        if let Some(default) = registry.get(&registry.default_source) {
            selections.push(SourceSelection {
                name: default.name.clone(),
                relevance_score: 0.5,
            });
            calls.push(ToolCall {
                source: default.name.clone(),
                operation: default.default_operation.clone(),
                params: CallParams {
                    limit: Some(registry.default_limit()),
                    ..CallParams::default()
                },
            });
            reasoning.push(format!(
                "No specific matches found, defaulting to {}",
                default.name
            ));
        }
    }

    debug!(
        target: "router",
        query_id = %crate::anon_hash(query),
        selected = selections.len(),
        "routed query"
    );

    RoutingResult {
        selections,
        calls,
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    const TEST_REGISTRY: &str = r#"
default_source = "nyc-311"
default_limit = 50

[[sources]]
name = "nyc-311"
address = "http://mcp-311:3000"
description = "NYC 311 service requests and complaints"
capabilities = ["complaints", "trends"]
keywords = ["311", "complaint", "noise"]
default_operation = "search_complaints"

[[sources.operations]]
operation = "analyze_trends"
keywords = ["trend", "over time", "increase", "decrease"]

[[sources.operations]]
operation = "get_response_times"
keywords = ["response time", "how long", "fast"]

[[sources]]
name = "nyc-dob"
address = "http://mcp-dob:3000"
description = "NYC Department of Buildings permits and violations"
capabilities = ["permits", "violations"]
keywords = ["building", "permit", "violation", "construction"]
default_operation = "search_violations"

[[sources.operations]]
operation = "search_permits"
keywords = ["permit"]

[[sources.operations]]
operation = "get_construction_activity"
keywords = ["construction", "activity"]
"#;

    fn registry() -> Registry {
        toml::from_str(TEST_REGISTRY).unwrap()
    }

    #[test]
    fn keyword_capability_and_description_scoring() {
        let reg = registry();
        let src = reg.get("nyc-311").unwrap();
        // "complaint" keyword (+1) and "complaints" capability (+2), plus
        // description words "complaints" (+0.5) and "service" (+0.5).
        let s = score("complaints about city service", src);
        assert!((s - 4.0).abs() < f32::EPSILON, "got {s}");
    }

    #[test]
    fn selections_sorted_descending_and_stable() {
        let reg = registry();
        let routing = route("noise complaints near a construction permit site", &reg, &QueryContext::default());
        assert_eq!(routing.selections.len(), 2);
        let scores: Vec<f32> = routing.selections.iter().map(|s| s.relevance_score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn nonmatching_query_falls_back_to_default_source() {
        let reg = registry();
        let routing = route("zzzz", &reg, &QueryContext::default());
        assert_eq!(routing.selections.len(), 1);
        assert_eq!(routing.selections[0].name, "nyc-311");
        assert!((routing.selections[0].relevance_score - 0.5).abs() < f32::EPSILON);
        assert_eq!(routing.calls[0].operation, "search_complaints");
        assert_eq!(routing.calls[0].params.limit, Some(50));
        assert_eq!(routing.calls[0].params.borough, None);
    }

    #[test]
    fn empty_query_still_routes() {
        let reg = registry();
        let routing = route("", &reg, &QueryContext::default());
        assert!(!routing.selections.is_empty());
    }

    #[test]
    fn operation_rules_win_over_default() {
        let reg = registry();
        let routing = route("are noise complaints on an increase over time?", &reg, &QueryContext::default());
        let call = routing.calls.iter().find(|c| c.source == "nyc-311").unwrap();
        assert_eq!(call.operation, "analyze_trends");
    }

    #[test]
    fn default_operation_when_no_rule_matches() {
        let reg = registry();
        let routing = route("building violation in brooklyn", &reg, &QueryContext::default());
        let call = routing.calls.iter().find(|c| c.source == "nyc-dob").unwrap();
        assert_eq!(call.operation, "search_violations");
    }

    #[test]
    fn borough_tie_break_follows_fixed_list_order() {
        // "queens" appears first in the text, but "brooklyn" is earlier in
        // the fixed vocabulary.
        let params = extract_params("queens and brooklyn noise", &QueryContext::default());
        assert_eq!(params.borough.as_deref(), Some("brooklyn"));
    }

    #[test]
    fn day_range_and_complaint_type_extraction() {
        let params = extract_params("noise complaints last month", &QueryContext::default());
        assert_eq!(params.days, Some(30));
        assert_eq!(params.complaint_type.as_deref(), Some("NOISE"));
    }

    #[test]
    fn context_overrides_text_derived_values() {
        let ctx = QueryContext {
            borough: Some("bronx".to_string()),
            days: Some(14),
            limit: Some(10),
        };
        let params = extract_params("brooklyn noise last week", &ctx);
        assert_eq!(params.borough.as_deref(), Some("bronx"));
        assert_eq!(params.days, Some(14));
        assert_eq!(params.limit, Some(10));
    }

    #[test]
    fn reasoning_lists_matched_keywords() {
        let reg = registry();
        let routing = route("noise complaint", &reg, &QueryContext::default());
        assert!(
            routing.reasoning[0].contains("Matched keywords: complaint, noise"),
            "unexpected reasoning: {}",
            routing.reasoning[0]
        );
    }
}
