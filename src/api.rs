// src/api.rs
//! Thin HTTP transport over the pipeline: one inbound request maps to one
//! `route → dispatch → synthesize [→ diagnose]` run. No pipeline logic
//! lives here beyond input validation and response shaping.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::diagnose::{self, DiagnosisReport, PipelineOutput};
use crate::dispatch::{dispatch, ToolTransport};
use crate::registry::Registry;
use crate::router::{route, QueryContext};
use crate::synthesize::synthesize;

pub const SERVICE_NAME: &str = "citypulse-orchestrator";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub transport: Arc<dyn ToolTransport>,
    pub call_timeout: Duration,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn ToolTransport>) -> Self {
        let call_timeout = Duration::from_secs(registry.call_timeout_secs());
        Self {
            registry,
            transport,
            call_timeout,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sources", get(sources))
        .route("/query", post(query))
        .route("/diagnose", post(diagnose_query))
        .route("/area-health", post(area_health))
        .route("/call/{source}/{operation}", post(direct_call))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "registered_sources": state.registry.len(),
    }))
}

async fn sources(State(state): State<AppState>) -> Json<Registry> {
    Json(state.registry.as_ref().clone())
}

#[derive(Debug, Deserialize)]
struct QueryReq {
    #[serde(default)]
    query: String,
    #[serde(default)]
    context: QueryContext,
}

#[derive(Debug, Serialize)]
struct RoutingView {
    selected: Vec<String>,
    reasoning: Vec<String>,
}

#[derive(Debug, Serialize)]
struct QueryResp {
    query: String,
    routing: RoutingView,
    #[serde(flatten)]
    output: PipelineOutput,
}

/// Run the first pipeline stage for one request.
async fn run_pipeline(
    state: &AppState,
    query_text: &str,
    context: &QueryContext,
) -> (RoutingView, PipelineOutput) {
    let routing = route(query_text, &state.registry, context);
    let results = dispatch(
        &routing.calls,
        &state.registry,
        Arc::clone(&state.transport),
        state.call_timeout,
    )
    .await;
    let synthesis = synthesize(&results);

    let view = RoutingView {
        selected: routing.selections.iter().map(|s| s.name.clone()).collect(),
        reasoning: routing.reasoning,
    };
    (view, PipelineOutput { results, synthesis })
}

async fn query(
    State(state): State<AppState>,
    Json(body): Json<QueryReq>,
) -> Result<Json<QueryResp>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(bad_request("Query is required"));
    }
    counter!("queries_total").increment(1);
    info!(target: "api", query_id = %crate::anon_hash(&body.query), "query received");

    let (routing, output) = run_pipeline(&state, &body.query, &body.context).await;
    Ok(Json(QueryResp {
        query: body.query,
        routing,
        output,
    }))
}

#[derive(Debug, Serialize)]
struct DiagnoseResp {
    query: String,
    diagnosis: DiagnosisReport,
    /// Raw pipeline output, included for transparency.
    raw: PipelineOutput,
}

async fn diagnose_query(
    State(state): State<AppState>,
    Json(body): Json<QueryReq>,
) -> Result<Json<DiagnoseResp>, ApiError> {
    if body.query.trim().is_empty() {
        return Err(bad_request("Query is required"));
    }
    counter!("diagnoses_total").increment(1);

    let (_routing, output) = run_pipeline(&state, &body.query, &body.context).await;
    let diagnosis = diagnose::diagnose(&body.query, &output, &body.context);
    Ok(Json(DiagnoseResp {
        query: body.query,
        diagnosis,
        raw: output,
    }))
}

#[derive(Debug, Deserialize)]
struct AreaHealthReq {
    #[serde(default)]
    area: Option<String>,
    #[serde(default)]
    days: Option<u32>,
}

async fn area_health(
    State(state): State<AppState>,
    Json(body): Json<AreaHealthReq>,
) -> Result<Json<diagnose::AreaHealthReport>, ApiError> {
    let Some(area) = body.area.filter(|a| !a.trim().is_empty()) else {
        return Err(bad_request("Area is required"));
    };
    let days = body.days.unwrap_or(90);

    let report = diagnose::area_health(
        &area,
        days,
        &state.registry,
        Arc::clone(&state.transport),
        state.call_timeout,
    )
    .await
    .map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{e:#}") })),
        )
    })?;
    Ok(Json(report))
}

/// Direct tool invocation for advanced callers; bypasses routing entirely.
async fn direct_call(
    State(state): State<AppState>,
    Path((source, operation)): Path<(String, String)>,
    Json(params): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let Some(descriptor) = state.registry.get(&source) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Source not found" })),
        ));
    };

    let invoked = tokio::time::timeout(
        state.call_timeout,
        state
            .transport
            .invoke(&descriptor.address, &operation, &params),
    )
    .await;

    match invoked {
        Ok(Ok(payload)) => Ok(Json(payload)),
        Ok(Err(e)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": format!("{e:#}") })),
        )),
        Err(_) => Err((
            StatusCode::GATEWAY_TIMEOUT,
            Json(
                json!({ "error": format!("timed out after {}s", state.call_timeout.as_secs()) }),
            ),
        )),
    }
}
