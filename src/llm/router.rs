//! Task-type routing table: maps a workflow node's task onto an [`ExpertClass`]
//! and the [`ModelConfig`] registered for it.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::types::{ExpertClass, ModelConfig, TaskType};

/// A routing request carrying just enough context to pick a backend.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub task_type: TaskType,
    pub context_needed: Option<u32>,
    pub deterministic: bool,
}

impl RouteRequest {
    pub fn new(task_type: TaskType) -> Self {
        Self { task_type, context_needed: None, deterministic: false }
    }

    pub fn with_context_needed(mut self, tokens: u32) -> Self {
        self.context_needed = Some(tokens);
        self
    }

    pub fn deterministic(mut self) -> Self {
        self.deterministic = true;
        self
    }
}

/// A small typed registry of backend configs, keyed by [`ExpertClass`].
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    configs: HashMap<ExpertClass, ModelConfig>,
}

impl ModelRegistry {
    /// The four expert classes, seeded with placeholder model ids; callers
    /// typically override `model_id` per class from environment config before use.
    pub fn with_defaults() -> Self {
        let mut configs = HashMap::new();
        configs.insert(
            ExpertClass::Worker,
            ModelConfig {
                key: ExpertClass::Worker,
                model_id: "worker-default".into(),
                purpose: "extraction / cartographer".into(),
                default_context: Some(16_384),
                max_context: None,
                quantization: Some("fp4".into()),
                endpoint_env: ExpertClass::Worker.endpoint_env(),
            },
        );
        configs.insert(
            ExpertClass::Brain,
            ModelConfig {
                key: ExpertClass::Brain,
                model_id: "brain-default".into(),
                purpose: "critic / high-level reasoning".into(),
                default_context: None,
                max_context: None,
                quantization: Some("mxfp4".into()),
                endpoint_env: ExpertClass::Brain.endpoint_env(),
            },
        );
        configs.insert(
            ExpertClass::Vision,
            ModelConfig {
                key: ExpertClass::Vision,
                model_id: "vision-default".into(),
                purpose: "vision / OCR".into(),
                default_context: None,
                max_context: None,
                quantization: Some("int8".into()),
                endpoint_env: ExpertClass::Vision.endpoint_env(),
            },
        );
        configs.insert(
            ExpertClass::Drafter,
            ModelConfig {
                key: ExpertClass::Drafter,
                model_id: "drafter-default".into(),
                purpose: "synthesizer / prose writing".into(),
                default_context: None,
                max_context: None,
                quantization: None,
                endpoint_env: ExpertClass::Drafter.endpoint_env(),
            },
        );
        configs.insert(
            ExpertClass::Embedder,
            ModelConfig {
                key: ExpertClass::Embedder,
                model_id: "all-MiniLM-L6-v2".into(),
                purpose: "embeddings".into(),
                default_context: None,
                max_context: None,
                quantization: None,
                endpoint_env: ExpertClass::Embedder.endpoint_env(),
            },
        );
        Self { configs }
    }

    pub fn set(&mut self, class: ExpertClass, config: ModelConfig) {
        self.configs.insert(class, config);
    }

    pub fn get(&self, class: ExpertClass) -> Result<&ModelConfig> {
        self.configs
            .get(&class)
            .ok_or_else(|| Error::not_found("model_config", format!("{class:?}")))
    }

    pub fn validate_all(&self) -> Result<()> {
        for config in self.configs.values() {
            config.validate().map_err(Error::validation)?;
        }
        Ok(())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Maps workflow task types to the expert class that should serve them (§4.2).
pub struct ModelRouter {
    registry: ModelRegistry,
}

impl ModelRouter {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    /// Pure classification: which expert class answers this task type.
    pub fn classify(task_type: TaskType) -> ExpertClass {
        match task_type {
            TaskType::Extract | TaskType::Kg => ExpertClass::Worker,
            TaskType::Qa | TaskType::Adjudicate | TaskType::Conflict => ExpertClass::Brain,
            TaskType::Synthesize => ExpertClass::Drafter,
            TaskType::Vision => ExpertClass::Vision,
            TaskType::Embeddings | TaskType::Rerank => ExpertClass::Embedder,
        }
    }

    /// The fallback expert class for a task type, if one is configured
    /// (§4.2 "Extraction→Worker with Brain fallback; Critic→Brain (no fallback)").
    pub fn fallback_for(task_type: TaskType) -> Option<ExpertClass> {
        match task_type {
            TaskType::Extract | TaskType::Kg => Some(ExpertClass::Brain),
            _ => None,
        }
    }

    /// Resolve a request to a registered model config.
    pub fn route(&self, request: &RouteRequest) -> Result<&ModelConfig> {
        let class = Self::classify(request.task_type);
        self.registry.get(class)
    }

    /// Resolve the fallback model config for a request, if any is both
    /// configured by [`Self::fallback_for`] and registered.
    pub fn route_fallback(&self, request: &RouteRequest) -> Option<&ModelConfig> {
        let class = Self::fallback_for(request.task_type)?;
        self.registry.get(class).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_and_kg_route_to_worker() {
        assert_eq!(ModelRouter::classify(TaskType::Extract), ExpertClass::Worker);
        assert_eq!(ModelRouter::classify(TaskType::Kg), ExpertClass::Worker);
    }

    #[test]
    fn adjudicate_and_conflict_route_to_brain() {
        assert_eq!(ModelRouter::classify(TaskType::Adjudicate), ExpertClass::Brain);
        assert_eq!(ModelRouter::classify(TaskType::Conflict), ExpertClass::Brain);
    }

    #[test]
    fn vision_routes_to_vision_expert() {
        assert_eq!(ModelRouter::classify(TaskType::Vision), ExpertClass::Vision);
    }

    #[test]
    fn synthesize_routes_to_drafter() {
        assert_eq!(ModelRouter::classify(TaskType::Synthesize), ExpertClass::Drafter);
    }

    #[test]
    fn extraction_falls_back_to_brain_but_critic_has_no_fallback() {
        assert_eq!(ModelRouter::fallback_for(TaskType::Extract), Some(ExpertClass::Brain));
        assert_eq!(ModelRouter::fallback_for(TaskType::Adjudicate), None);
    }

    #[test]
    fn embeddings_and_rerank_route_to_embedder() {
        assert_eq!(ModelRouter::classify(TaskType::Embeddings), ExpertClass::Embedder);
        assert_eq!(ModelRouter::classify(TaskType::Rerank), ExpertClass::Embedder);
    }

    #[test]
    fn router_resolves_registered_config() {
        let router = ModelRouter::new(ModelRegistry::with_defaults());
        let config = router.route(&RouteRequest::new(TaskType::Extract)).unwrap();
        assert_eq!(config.key, ExpertClass::Worker);
    }

    #[test]
    fn router_errors_on_missing_registration() {
        let mut registry = ModelRegistry::with_defaults();
        registry.configs.remove(&ExpertClass::Vision);
        let router = ModelRouter::new(registry);
        assert!(router.route(&RouteRequest::new(TaskType::Vision)).is_err());
    }

    #[test]
    fn registry_validation_catches_bad_config() {
        let mut registry = ModelRegistry::with_defaults();
        registry.set(
            ExpertClass::Worker,
            ModelConfig {
                key: ExpertClass::Worker,
                model_id: "".into(),
                purpose: "broken".into(),
                default_context: None,
                max_context: None,
                quantization: None,
                endpoint_env: "WORKER_URL",
            },
        );
        assert!(registry.validate_all().is_err());
    }
}
