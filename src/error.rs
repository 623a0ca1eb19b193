//! Error types for the orchestration core.

use thiserror::Error;

/// Result type alias using the core's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing input at submission time (§7 "Input errors").
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity (project, job, claim, conflict report...) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A backing collaborator (document store, vector store, LLM endpoint) is unavailable.
    #[error("dependency unavailable: {dependency} - {message}")]
    DependencyUnavailable { dependency: String, message: String },

    /// A node raised an in-workflow validation failure (evidence, citation, vocabulary).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The workflow deadlocked: repeated critic failure with a BLOCKER conflict item.
    #[error("workflow deadlocked for job {job_id}: {reason}")]
    Deadlock { job_id: String, reason: String },

    /// An LLM response could not be parsed as the expected structured JSON.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// A response was flagged by the garble detector.
    #[error("garbled response from {expert_name}")]
    Garbled { expert_name: String },

    /// An LLM endpoint returned a non-success response.
    #[error("LLM API error: {expert_name} - {message}")]
    LlmApi { expert_name: String, message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying SQLite store error.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Internal invariant violation; should not normally surface to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn dependency_unavailable(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn deadlock(job_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Deadlock {
            job_id: job_id.into(),
            reason: reason.into(),
        }
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::ParseFailure(message.into())
    }

    pub fn garbled(expert_name: impl Into<String>) -> Self {
        Self::Garbled {
            expert_name: expert_name.into(),
        }
    }

    pub fn llm_api(expert_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            expert_name: expert_name.into(),
            message: message.into(),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for failures that should be treated as a recoverable dependency outage
    /// (§7: request rejected 503 at submission, or mid-job route to Failure Cleanup).
    pub fn is_dependency_unavailable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable { .. } | Self::Store(_) | Self::Timeout { .. })
    }
}
