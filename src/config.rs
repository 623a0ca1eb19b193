//! Internal tunable configuration.
//!
//! Everything here is a plain builder-style struct constructed by the embedding
//! application; this crate never reads environment variables or config files
//! itself (env/config loading is an external concern).

use std::path::PathBuf;
use std::time::Duration;

/// Top-level knobs for the Job Manager and workflow state machine.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Concurrent RUNNING job capacity (§4.1 "Concurrency admission").
    pub job_slot_capacity: usize,
    /// Maximum Cartographer<->Critic revision loops before Reframing/Failure Cleanup (§4.4).
    pub max_revisions: u32,
    /// Revision count at which a BLOCKER conflict item triggers Reframing (§3.5).
    pub deadlock_revision_threshold: u32,
    /// Maximum parent-chain depth walked by the job-version function (§4.1).
    pub max_lineage_depth: u32,
    /// Top-K chunks retrieved per research question (§4.4 Cartographer step 3).
    pub chunks_per_research_question: usize,
    /// Maximum images processed by the Vision node (§4.4 Vision).
    pub max_images: usize,
    /// Root directory Vision copies selected images into, one subdirectory per
    /// project, filed under a UUID (§4.4 Vision "artifacts directory").
    pub artifacts_dir: PathBuf,
    /// Request timeout for LLM chat calls (§5 "Timeouts").
    pub llm_timeout: Duration,
    /// Request timeout for vision calls (§5 "Timeouts").
    pub vision_timeout: Duration,
    /// Request timeout for telemetry/registry probes (§5 "Timeouts").
    pub probe_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            job_slot_capacity: 2,
            max_revisions: 3,
            deadlock_revision_threshold: 2,
            max_lineage_depth: 10,
            chunks_per_research_question: 5,
            max_images: 5,
            artifacts_dir: PathBuf::from("artifacts"),
            llm_timeout: Duration::from_secs(30),
            vision_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_slot_capacity(mut self, capacity: usize) -> Self {
        self.job_slot_capacity = capacity;
        self
    }

    pub fn with_max_revisions(mut self, max_revisions: u32) -> Self {
        self.max_revisions = max_revisions;
        self
    }

    pub fn with_deadlock_revision_threshold(mut self, threshold: u32) -> Self {
        self.deadlock_revision_threshold = threshold;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }
}

/// KV-cache backpressure thresholds (§4.2).
#[derive(Debug, Clone, Copy)]
pub struct BackpressureConfig {
    /// At or above this utilization, the gateway reports `retry_later`.
    pub retry_later_threshold: f64,
    /// At or above this utilization (but below `retry_later_threshold`), the gateway delays.
    pub delay_threshold: f64,
    /// Sleep duration applied when in the delay band.
    pub delay: Duration,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            retry_later_threshold: 0.95,
            delay_threshold: 0.85,
            delay: Duration::from_millis(200),
        }
    }
}

/// Prompt registry tunables (§4.3).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Whether the registry feature is enabled at all.
    pub enabled: bool,
    /// Base URL of the external prompt registry, when enabled.
    pub registry_url: Option<String>,
    /// Cache TTL for registry-sourced templates.
    pub ttl: Duration,
    /// HTTP timeout for registry GETs.
    pub fetch_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            registry_url: None,
            ttl: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(2),
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry_url(mut self, url: impl Into<String>) -> Self {
        self.registry_url = Some(url.into());
        self.enabled = true;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}
