// src/dispatch.rs
//! Concurrent fan-out of routed tool calls.
//!
//! Every call runs in its own task under a fixed per-call timeout. A failed
//! call (unknown source, transport error, timeout, panic) becomes a
//! `RawResult` carrying an error message; it never cancels sibling calls or
//! aborts the batch. Output order always equals input order so downstream
//! summaries are deterministic.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use tracing::warn;

use crate::registry::Registry;
use crate::router::ToolCall;

/// Outcome of one tool call. Exactly one of `payload` / `error` is set.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawResult {
    pub source: String,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawResult {
    pub fn ok(source: impl Into<String>, operation: impl Into<String>, payload: Value) -> Self {
        Self {
            source: source.into(),
            operation: operation.into(),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(source: impl Into<String>, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            operation: operation.into(),
            payload: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.payload.is_some()
    }
}

/// Seam between the pipeline and the upstream sources. Production uses
/// `HttpTransport`; tests inject fakes with scripted failures and delays.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn invoke(&self, address: &str, operation: &str, params: &Value) -> Result<Value>;
}

/// POSTs `{address}/tools/{operation}` with the JSON parameters, mirroring
/// the wire contract of the upstream source services.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn invoke(&self, address: &str, operation: &str, params: &Value) -> Result<Value> {
        let url = format!("{address}/tools/{operation}");
        let resp = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .with_context(|| format!("calling {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {status} from {url}");
        }
        resp.json::<Value>()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }
}

/// Execute all calls concurrently and collect one `RawResult` per call, in
/// input order.
pub async fn dispatch(
    calls: &[ToolCall],
    registry: &Registry,
    transport: Arc<dyn ToolTransport>,
    call_timeout: Duration,
) -> Vec<RawResult> {
    let mut handles = Vec::with_capacity(calls.len());

    for call in calls {
        counter!("dispatch_calls_total").increment(1);

        let address = registry.get(&call.source).map(|s| s.address.clone());
        let transport = Arc::clone(&transport);
        let call = call.clone();

        handles.push(tokio::spawn(async move {
            let Some(address) = address else {
                return RawResult::err(
                    call.source,
                    call.operation,
                    "source not found in registry",
                );
            };
            let params = match serde_json::to_value(&call.params) {
                Ok(v) => v,
                Err(e) => {
                    return RawResult::err(
                        call.source,
                        call.operation,
                        format!("encoding parameters: {e}"),
                    )
                }
            };
            let invoked = tokio::time::timeout(
                call_timeout,
                transport.invoke(&address, &call.operation, &params),
            )
            .await;
            match invoked {
                Ok(Ok(payload)) => RawResult::ok(call.source, call.operation, payload),
                Ok(Err(e)) => RawResult::err(call.source, call.operation, format!("{e:#}")),
                Err(_) => RawResult::err(
                    call.source,
                    call.operation,
                    format!("timed out after {}s", call_timeout.as_secs()),
                ),
            }
        }));
    }

    // Awaiting handles in spawn order keeps the output aligned with the
    // input regardless of completion order.
    let mut results = Vec::with_capacity(handles.len());
    for (handle, call) in handles.into_iter().zip(calls) {
        let result = match handle.await {
            Ok(r) => r,
            Err(e) => RawResult::err(
                call.source.clone(),
                call.operation.clone(),
                format!("call task failed: {e}"),
            ),
        };
        if let Some(err) = &result.error {
            counter!("dispatch_failures_total").increment(1);
            warn!(
                target: "dispatch",
                source = %result.source,
                operation = %result.operation,
                error = %err,
                "tool call failed"
            );
        }
        results.push(result);
    }
    results
}
