//! The Expert Gateway: task routing, HTTP backends, KV-cache backpressure, fp4 garble
//! detection, and per-expert cost tracking (§4.2).

mod backpressure;
mod client;
mod garble;
mod router;
mod types;

pub use backpressure::{evaluate as evaluate_backpressure, BackpressureDecision};
pub use client::{ExpertBackend, Gateway, HttpExpertBackend};
pub use garble::is_garbled;
pub use router::{ModelRegistry, ModelRouter, RouteRequest};
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, CostTracker, ExpertClass,
    ModelConfig, StopReason, TaskType, TokenUsage,
};
