//! Structured event sink used by all components (§4.6).
//!
//! `emit_event` writes newline-delimited JSON to a sink file and best-effort
//! POSTs to an external tracing service. Every failure is swallowed: telemetry
//! must never break the workflow it is observing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A single telemetry record (§6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub metadata: Value,
}

/// Emitter configuration. `sink_path` is optional; when unset, events are only
/// forwarded to `tracing` and (if a remote URL is configured) POSTed remotely.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub sink_path: Option<PathBuf>,
    pub remote_url: Option<String>,
    pub timeout: Duration,
}

/// The telemetry seam. Cheap to clone (wraps an `Arc`'d file mutex and an
/// optional HTTP client).
#[derive(Clone)]
pub struct TelemetryEmitter {
    config: TelemetryConfig,
    file_lock: Arc<Mutex<()>>,
    http: Option<reqwest::Client>,
}

impl TelemetryEmitter {
    pub fn new(config: TelemetryConfig) -> Self {
        let http = config.remote_url.as_ref().map(|_| {
            reqwest::Client::builder()
                .timeout(if config.timeout.is_zero() {
                    Duration::from_secs(2)
                } else {
                    config.timeout
                })
                .build()
                .unwrap_or_default()
        });
        Self {
            config,
            file_lock: Arc::new(Mutex::new(())),
            http,
        }
    }

    /// No-op sink useful for tests and for callers that don't want a file/HTTP seam.
    pub fn noop() -> Self {
        Self::new(TelemetryConfig::default())
    }

    /// Emit an event. Never raises; all failures are logged at `warn` and dropped.
    pub async fn emit_event(&self, event_type: impl Into<String>, metadata: Value) {
        self.emit(TelemetryEvent {
            event_type: event_type.into(),
            job_id: None,
            project_id: None,
            node_name: None,
            timestamp: Utc::now(),
            duration_ms: None,
            metadata,
        })
        .await;
    }

    pub async fn emit(&self, event: TelemetryEvent) {
        debug!(event_type = %event.event_type, job_id = ?event.job_id, "telemetry event");

        if let Some(path) = &self.config.sink_path {
            if let Ok(line) = serde_json::to_string(&event) {
                let _guard = self.file_lock.lock().await;
                let file = OpenOptions::new().create(true).append(true).open(path).await;
                match file {
                    Ok(mut f) => {
                        if let Err(e) = f.write_all(format!("{line}\n").as_bytes()).await {
                            warn!(error = %e, "telemetry sink write failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "telemetry sink open failed"),
                }
            }
        }

        if let (Some(client), Some(url)) = (&self.http, &self.config.remote_url) {
            let client = client.clone();
            let url = url.clone();
            let payload = serde_json::to_value(&event).unwrap_or_default();
            // Best-effort: failures are swallowed, never propagated to the workflow.
            if let Err(e) = client.post(&url).json(&payload).send().await {
                warn!(error = %e, "telemetry remote post failed");
            }
        }
    }
}

impl Default for TelemetryEmitter {
    fn default() -> Self {
        Self::noop()
    }
}

/// Records the start/end of a node execution, mirroring §4.6's node wrapper:
/// `duration_ms`, claim/conflict/block counts, and the relevant prompt-manifest slice.
pub struct NodeSpan {
    emitter: TelemetryEmitter,
    node_name: String,
    job_id: String,
    project_id: Option<String>,
    started_at: std::time::Instant,
}

impl NodeSpan {
    pub fn start(emitter: TelemetryEmitter, node_name: impl Into<String>, job_id: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            emitter,
            node_name: node_name.into(),
            job_id: job_id.into(),
            project_id,
            started_at: std::time::Instant::now(),
        }
    }

    pub async fn finish(self, outcome: &str, counts: Value) {
        let duration_ms = self.started_at.elapsed().as_millis() as u64;
        self.emitter
            .emit(TelemetryEvent {
                event_type: format!("node.{}.{}", self.node_name, outcome),
                job_id: Some(self.job_id),
                project_id: self.project_id,
                node_name: Some(self.node_name.clone()),
                timestamp: Utc::now(),
                duration_ms: Some(duration_ms),
                metadata: counts,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn noop_emitter_never_panics() {
        let emitter = TelemetryEmitter::noop();
        emitter.emit_event("job_created", json!({"job_id": "abc"})).await;
    }

    #[tokio::test]
    async fn file_sink_writes_ndjson_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.ndjson");
        let emitter = TelemetryEmitter::new(TelemetryConfig {
            sink_path: Some(path.clone()),
            remote_url: None,
            timeout: Duration::from_secs(2),
        });
        emitter.emit_event("job_created", json!({"job_id": "abc"})).await;
        emitter.emit_event("job_completed", json!({"job_id": "abc"})).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event_type"], "job_created");
    }

    #[tokio::test]
    async fn node_span_emits_duration_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.ndjson");
        let emitter = TelemetryEmitter::new(TelemetryConfig {
            sink_path: Some(path.clone()),
            remote_url: None,
            timeout: Duration::from_secs(2),
        });
        let span = NodeSpan::start(emitter, "cartographer", "job-1", Some("proj-1".into()));
        span.finish("end", json!({"triples": 3})).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(parsed["event_type"], "node.cartographer.end");
        assert!(parsed["duration_ms"].is_number());
    }
}
