//! Expert backend trait, a generic HTTP implementation, and the cost/backpressure/garble
//! wrapping gateway used by workflow nodes to talk to experts (§4.2).

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tokio::time::sleep;

use crate::config::BackpressureConfig;
use crate::error::{Error, Result};
use crate::telemetry::TelemetryEmitter;

use super::backpressure::{evaluate, BackpressureDecision};
use super::garble::is_garbled;
use super::router::{ModelRouter, RouteRequest};
use super::types::{
    ChatRole, CompletionRequest, CompletionResponse, CostTracker, ExpertClass, StopReason,
    TokenUsage,
};

/// A single expert backend: something that can turn a [`CompletionRequest`] into a
/// [`CompletionResponse`] and self-report its current KV-cache utilization.
#[async_trait]
pub trait ExpertBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
    async fn utilization(&self) -> f64;
    fn expert(&self) -> ExpertClass;
}

#[derive(Debug, Serialize)]
struct BackendRequest {
    model: String,
    messages: Vec<BackendMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct BackendMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct BackendResponse {
    model: String,
    content: String,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: BackendUsage,
}

#[derive(Debug, Deserialize)]
struct BackendUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct BackendUtilization {
    kv_cache_utilization: f64,
}

/// Backends may self-report KV-cache utilization on a 0-1 or 0-100 scale;
/// normalize to 0-1 before it reaches the backpressure gate's thresholds (§4.2).
fn normalize_utilization(raw: f64) -> f64 {
    if raw > 1.0 {
        raw / 100.0
    } else {
        raw
    }
}

fn build_http_client(timeout: Duration) -> Client {
    // Sandboxed environments can panic during proxy auto-detection; fall back to no-proxy.
    match catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build())) {
        Ok(Ok(client)) => client,
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client"),
    }
}

/// A real expert backend speaking a simple JSON chat protocol over HTTP
/// (the shape every in-house sglang/ollama-fronted expert exposes).
pub struct HttpExpertBackend {
    expert: ExpertClass,
    model_id: String,
    base_url: String,
    http: Client,
}

impl HttpExpertBackend {
    pub fn new(expert: ExpertClass, model_id: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            expert,
            model_id: model_id.into(),
            base_url: base_url.into(),
            http: build_http_client(timeout),
        }
    }
}

#[async_trait]
impl ExpertBackend for HttpExpertBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.clone().unwrap_or_else(|| self.model_id.clone());
        let messages = request
            .messages
            .iter()
            .map(|m| BackendMessage {
                role: match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        let body = BackendRequest {
            model: model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::llm_api(format!("{:?}", self.expert), format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::llm_api(format!("{:?}", self.expert), format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(Error::llm_api(format!("{:?}", self.expert), format!("HTTP {status}: {text}")));
        }

        let parsed: BackendResponse = serde_json::from_str(&text)
            .map_err(|e| Error::parse_failure(format!("{:?} response: {e}", self.expert)))?;

        if is_garbled(&parsed.content) {
            return Err(Error::garbled(format!("{:?}", self.expert)));
        }

        Ok(CompletionResponse {
            model: parsed.model,
            content: parsed.content,
            stop_reason: match parsed.stop_reason.as_deref() {
                Some("max_tokens") => StopReason::MaxTokens,
                Some("stop_sequence") => StopReason::StopSequence,
                _ => StopReason::EndTurn,
            },
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
            expert: self.expert,
        })
    }

    async fn utilization(&self) -> f64 {
        let url = format!("{}/health", self.base_url);
        let raw = match self.http.get(&url).send().await {
            Ok(response) => response
                .json::<BackendUtilization>()
                .await
                .map(|u| u.kv_cache_utilization)
                .unwrap_or(0.0),
            Err(_) => 0.0,
        };
        normalize_utilization(raw)
    }

    fn expert(&self) -> ExpertClass {
        self.expert
    }
}

/// Routes requests to the right backend, applies the backpressure gate, retries
/// once on a garbled response, and accumulates per-expert cost (§4.2).
pub struct Gateway {
    router: ModelRouter,
    backends: HashMap<ExpertClass, Arc<dyn ExpertBackend>>,
    backpressure: BackpressureConfig,
    costs: RwLock<CostTracker>,
    telemetry: TelemetryEmitter,
}

impl Gateway {
    pub fn new(router: ModelRouter, backpressure: BackpressureConfig) -> Self {
        Self {
            router,
            backends: HashMap::new(),
            backpressure,
            costs: RwLock::new(CostTracker::default()),
            telemetry: TelemetryEmitter::noop(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ExpertBackend>) -> Self {
        self.backends.insert(backend.expert(), backend);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryEmitter) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub async fn costs(&self) -> CostTracker {
        self.costs.read().await.clone()
    }

    /// Emit one telemetry event per attempt, with attempt index, latency, and
    /// outcome (§4.2 "Emit one telemetry event per attempt").
    async fn record_attempt(&self, expert: ExpertClass, attempt: u32, started: std::time::Instant, result: &Result<CompletionResponse>) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(Error::Garbled { .. }) => "garbled",
            Err(Error::LlmApi { .. }) => "llm_api_error",
            Err(Error::DependencyUnavailable { .. }) => "dependency_unavailable",
            Err(_) => "error",
        };
        self.telemetry
            .emit_event(
                "llm_attempt",
                json!({
                    "expert": format!("{:?}", expert),
                    "attempt": attempt,
                    "latency_ms": started.elapsed().as_millis() as u64,
                    "outcome": outcome,
                }),
            )
            .await;
    }

    /// Route, gate on backpressure, issue the request, and retry once: a garbled
    /// response is retried on the same expert, an HTTP/network error is retried on
    /// the routed fallback expert if one is configured (§4.2 "Retry/fallback").
    /// Never more than one retry either way; the last error propagates.
    pub async fn complete(&self, request_kind: &RouteRequest, request: CompletionRequest) -> Result<CompletionResponse> {
        let config = self.router.route(request_kind)?;
        let backend = self
            .backends
            .get(&config.key)
            .ok_or_else(|| Error::dependency_unavailable(format!("{:?}", config.key), "no backend registered"))?;

        match evaluate(backend.utilization().await, &self.backpressure) {
            BackpressureDecision::RetryLater => {
                return Err(Error::dependency_unavailable(format!("{:?}", config.key), "retry_later: KV-cache saturated"));
            }
            BackpressureDecision::Delay(duration) => sleep(duration).await,
            BackpressureDecision::Proceed => {}
        }

        let primary_started = std::time::Instant::now();
        let primary_result = backend.complete(request.clone()).await;
        self.record_attempt(config.key, 1, primary_started, &primary_result).await;

        let response = match primary_result {
            Ok(response) => response,
            Err(Error::Garbled { .. }) => {
                let retry_started = std::time::Instant::now();
                let retry_result = backend.complete(request).await;
                self.record_attempt(config.key, 2, retry_started, &retry_result).await;
                retry_result?
            }
            Err(primary_err @ Error::LlmApi { .. }) | Err(primary_err @ Error::DependencyUnavailable { .. }) => {
                let fallback_class = self.router.route_fallback(request_kind).map(|c| c.key);
                let fallback = fallback_class.and_then(|class| self.backends.get(&class));
                match fallback {
                    Some(fallback_backend) => {
                        let retry_started = std::time::Instant::now();
                        let retry_result = fallback_backend.complete(request).await;
                        self.record_attempt(fallback_backend.expert(), 2, retry_started, &retry_result).await;
                        retry_result?
                    }
                    None => return Err(primary_err),
                }
            }
            Err(other) => return Err(other),
        };

        let mut costs = self.costs.write().await;
        costs.record(response.expert, response.usage);

        Ok(response)
    }
}
