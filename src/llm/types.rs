//! Core LLM wire types: expert classes, model configs, chat messages, and cost tracking.

use serde::{Deserialize, Serialize};

/// One of the four backend roles the orchestrator routes work to (§4.2, Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertClass {
    /// Extraction / Cartographer: fp4, deterministic structured output (EXTRACTION_SCHEMA).
    Worker,
    /// Critic / high-level reasoning and adjudication (LOGIC_REASONING).
    Brain,
    /// Vision / OCR for scanned pages and figures (VISION).
    Vision,
    /// Synthesizer prose writing (PROSE_WRITING).
    Drafter,
    /// Text embeddings and reranking (ambient; serves the vector store, not a
    /// workflow node call).
    Embedder,
}

impl ExpertClass {
    /// Environment variable conventionally used to locate this expert's endpoint.
    pub fn endpoint_env(&self) -> &'static str {
        match self {
            Self::Worker => "WORKER_URL",
            Self::Brain => "BRAIN_URL",
            Self::Vision => "VISION_URL",
            Self::Drafter => "DRAFTER_URL",
            Self::Embedder => "EMBEDDER_URL",
        }
    }
}

/// Task types the router maps onto an [`ExpertClass`] (§4.2 "Routing table").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Extract,
    Kg,
    Qa,
    Synthesize,
    Adjudicate,
    Conflict,
    Vision,
    Embeddings,
    Rerank,
}

/// Static configuration for one backend, analogous to a model registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub key: ExpertClass,
    pub model_id: String,
    pub purpose: String,
    pub default_context: Option<u32>,
    pub max_context: Option<u32>,
    pub quantization: Option<String>,
    pub endpoint_env: &'static str,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model_id.is_empty() {
            return Err(format!("model '{:?}' is missing a model_id", self.key));
        }
        if let (Some(default_ctx), Some(max_ctx)) = (self.default_context, self.max_context) {
            if default_ctx > max_ctx {
                return Err(format!(
                    "model '{:?}' default_context ({default_ctx}) exceeds max_context ({max_ctx})",
                    self.key
                ));
            }
        }
        Ok(())
    }
}

/// Role of a single turn in a chat completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A non-streaming chat completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// Deterministic output preference (e.g. JSON mode / low temperature).
    pub deterministic: bool,
    /// Optional base64 image payloads for vision requests.
    pub images: Vec<String>,
}

impl CompletionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn deterministic(mut self) -> Self {
        self.deterministic = true;
        self.temperature = Some(0.0);
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub model: String,
    pub content: String,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
    pub expert: ExpertClass,
}

/// Per-expert-class token totals, accumulated across a job's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostTracker {
    worker: TokenUsage,
    brain: TokenUsage,
    vision: TokenUsage,
    drafter: TokenUsage,
    embedder: TokenUsage,
}

impl CostTracker {
    pub fn record(&mut self, expert: ExpertClass, usage: TokenUsage) {
        let slot = self.slot_mut(expert);
        slot.input_tokens += usage.input_tokens;
        slot.output_tokens += usage.output_tokens;
    }

    pub fn usage_for(&self, expert: ExpertClass) -> TokenUsage {
        *self.slot(expert)
    }

    pub fn total(&self) -> TokenUsage {
        TokenUsage {
            input_tokens: self.worker.input_tokens
                + self.brain.input_tokens
                + self.vision.input_tokens
                + self.drafter.input_tokens
                + self.embedder.input_tokens,
            output_tokens: self.worker.output_tokens
                + self.brain.output_tokens
                + self.vision.output_tokens
                + self.drafter.output_tokens
                + self.embedder.output_tokens,
        }
    }

    fn slot(&self, expert: ExpertClass) -> &TokenUsage {
        match expert {
            ExpertClass::Worker => &self.worker,
            ExpertClass::Brain => &self.brain,
            ExpertClass::Vision => &self.vision,
            ExpertClass::Drafter => &self.drafter,
            ExpertClass::Embedder => &self.embedder,
        }
    }

    fn slot_mut(&mut self, expert: ExpertClass) -> &mut TokenUsage {
        match expert {
            ExpertClass::Worker => &mut self.worker,
            ExpertClass::Brain => &mut self.brain,
            ExpertClass::Vision => &mut self.vision,
            ExpertClass::Drafter => &mut self.drafter,
            ExpertClass::Embedder => &mut self.embedder,
        }
    }
}
