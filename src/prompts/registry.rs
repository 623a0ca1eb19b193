//! Prompt registry: TTL-cached fetch of active prompt templates, with safe
//! fallback to factory defaults when the external registry is disabled,
//! unreachable, or has nothing for a given name (§4.3).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;

/// Where a resolved prompt template ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    Registry,
    Default,
}

/// Metadata describing how a template was resolved, for manifest/telemetry recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptUse {
    pub prompt_name: String,
    pub tag: String,
    pub resolved_source: PromptSource,
    pub cache_hit: bool,
    pub template_length: usize,
    /// Lowercase-hex SHA-256 of the resolved template (§3.2, §4.3 "prompt manifest").
    pub template_sha256: String,
    /// ISO-8601 UTC timestamp of when this template was resolved (§4.3 "prompt manifest").
    pub retrieved_at: String,
}

impl PromptUse {
    fn new(prompt_name: &str, tag: &str, template: &str, resolved_source: PromptSource, cache_hit: bool) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            tag: tag.to_string(),
            resolved_source,
            cache_hit,
            template_length: template.len(),
            template_sha256: sha256_hex(template),
            retrieved_at: Utc::now().to_rfc3339(),
        }
    }
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
struct CacheEntry {
    template: String,
    fetched_at: Instant,
}

/// In-memory TTL cache over `(prompt_name, tag)` keys, with registry fetch and
/// offline-safe fallback.
pub struct PromptRegistry {
    config: RegistryConfig,
    http: Option<reqwest::Client>,
    cache: RwLock<HashMap<(String, String), CacheEntry>>,
}

impl PromptRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let http = config.enabled.then(|| {
            reqwest::Client::builder()
                .timeout(config.fetch_timeout)
                .build()
                .unwrap_or_default()
        });
        Self { config, http, cache: RwLock::new(HashMap::new()) }
    }

    pub fn disabled() -> Self {
        Self::new(RegistryConfig { enabled: false, ..RegistryConfig::default() })
    }

    /// Fetch the active prompt, falling back to `default` on any failure.
    pub async fn get_active_prompt(&self, prompt_name: &str, default: &str, tag: &str) -> String {
        self.get_active_prompt_with_meta(prompt_name, default, tag).await.0
    }

    pub async fn get_active_prompt_with_meta(
        &self,
        prompt_name: &str,
        default: &str,
        tag: &str,
    ) -> (String, PromptUse) {
        let cache_key = (prompt_name.to_string(), tag.to_string());

        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&cache_key) {
                if entry.fetched_at.elapsed() < self.config.ttl {
                    debug!(prompt_name, tag, "prompt registry cache hit");
                    let meta = PromptUse::new(prompt_name, tag, &entry.template, PromptSource::Registry, true);
                    return (entry.template.clone(), meta);
                }
            }
        }
        {
            let mut cache = self.cache.write().await;
            cache.remove(&cache_key);
        }

        let (Some(http), Some(registry_url)) = (&self.http, &self.config.registry_url) else {
            debug!(prompt_name, "prompt registry disabled, using default");
            return (default.to_string(), PromptUse::new(prompt_name, tag, default, PromptSource::Default, false));
        };

        match fetch_template(http, registry_url, prompt_name, tag).await {
            Some(template) if !template.is_empty() => {
                info!(prompt_name, tag, len = template.len(), "fetched prompt from registry");
                self.cache
                    .write()
                    .await
                    .insert(cache_key, CacheEntry { template: template.clone(), fetched_at: Instant::now() });
                let meta = PromptUse::new(prompt_name, tag, &template, PromptSource::Registry, false);
                (template, meta)
            }
            _ => {
                warn!(prompt_name, tag, "registry returned nothing usable, using default");
                (default.to_string(), PromptUse::new(prompt_name, tag, default, PromptSource::Default, false))
            }
        }
    }

    /// Invalidate cached templates, optionally scoped to a name and/or tag (§4.3 "Cache invalidation").
    pub async fn clear(&self, prompt_name: Option<&str>, tag: Option<&str>) {
        let mut cache = self.cache.write().await;
        match (prompt_name, tag) {
            (None, None) => cache.clear(),
            (Some(name), None) => cache.retain(|(n, _), _| n != name),
            (None, Some(tag)) => cache.retain(|(_, t), _| t != tag),
            (Some(name), Some(tag)) => cache.retain(|(n, t), _| !(n == name && t == tag)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    template: Option<String>,
    content: Option<String>,
    text: Option<String>,
}

async fn fetch_template(http: &reqwest::Client, registry_url: &str, prompt_name: &str, tag: &str) -> Option<String> {
    let url = format!("{}/api/prompts/{}", registry_url.trim_end_matches('/'), prompt_name);
    let response = http.get(&url).query(&[("tag", tag)]).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let body: RegistryResponse = response.json().await.ok()?;
    body.template.or(body.content).or(body.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn disabled_registry_always_returns_default() {
        let registry = PromptRegistry::disabled();
        let template = registry.get_active_prompt("cartographer-v1", "fallback text", "production").await;
        assert_eq!(template, "fallback text");
    }

    #[tokio::test]
    async fn metadata_reports_default_source_when_disabled() {
        let registry = PromptRegistry::disabled();
        let (_, meta) = registry.get_active_prompt_with_meta("critic-v1", "fallback", "production").await;
        assert_eq!(meta.resolved_source, PromptSource::Default);
        assert!(!meta.cache_hit);
    }

    #[tokio::test]
    async fn metadata_carries_a_lowercase_hex_hash_and_retrieval_timestamp() {
        let registry = PromptRegistry::disabled();
        let (template, meta) = registry.get_active_prompt_with_meta("critic-v1", "fallback text", "production").await;
        assert_eq!(meta.template_sha256, sha256_hex(&template));
        assert!(meta.template_sha256.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(chrono::DateTime::parse_from_rfc3339(&meta.retrieved_at).is_ok());
    }

    #[tokio::test]
    async fn clear_removes_cached_entries() {
        let registry = PromptRegistry::disabled();
        registry
            .cache
            .write()
            .await
            .insert(("x".into(), "production".into()), CacheEntry { template: "t".into(), fetched_at: Instant::now() });
        registry.clear(Some("x"), None).await;
        assert!(registry.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn expired_entry_is_not_reused() {
        let mut config = RegistryConfig::default();
        config.ttl = StdDuration::from_millis(1);
        let registry = PromptRegistry::new(RegistryConfig { enabled: false, ..config });
        registry
            .cache
            .write()
            .await
            .insert(("y".into(), "production".into()), CacheEntry { template: "stale".into(), fetched_at: Instant::now() });
        tokio::time::sleep(StdDuration::from_millis(5)).await;
        let template = registry.get_active_prompt("y", "fresh default", "production").await;
        assert_eq!(template, "fresh default");
    }
}
