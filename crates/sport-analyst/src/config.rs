//! Analyst configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (`ANALYST_*`)
//! 2. TOML file passed to [`AnalystConfig::load`]
//! 3. Built-in defaults (local `go4it-ai-engine` on `localhost:8080`)
//!
//! | Variable               | Field                |
//! |------------------------|----------------------|
//! | `ANALYST_BACKEND_KIND` | `backend.kind`       |
//! | `ANALYST_PROVIDER`     | `backend.provider`   |
//! | `ANALYST_MODEL`        | `backend.model`      |
//! | `ANALYST_ENDPOINT`     | `backend.endpoint`   |
//! | `ANALYST_TIMEOUT_MS`   | `backend.timeout_ms` |
//! | `ANALYST_API_KEY`      | `backend.api_key`    |

use std::env;
use std::path::Path;

use analysis_core::CompositeWeights;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::{BackendKind, CloudProvider, ModelBackendDescriptor};

const DEFAULT_PROVIDER: &str = "go4it-ai-engine";
const DEFAULT_MODEL: &str = "sports-analysis-v1";
/// Default local inference base URL (OpenAI-compatible).
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:8080/v1";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Batch width of bulk analysis.
const DEFAULT_BULK_CONCURRENCY: usize = 3;
/// Tag count below which a result is backfilled from the sport vocabulary.
const DEFAULT_MIN_AI_TAGS: usize = 3;

const ENV_BACKEND_KIND: &str = "ANALYST_BACKEND_KIND";
const ENV_PROVIDER: &str = "ANALYST_PROVIDER";
const ENV_MODEL: &str = "ANALYST_MODEL";
const ENV_ENDPOINT: &str = "ANALYST_ENDPOINT";
const ENV_TIMEOUT_MS: &str = "ANALYST_TIMEOUT_MS";
const ENV_API_KEY: &str = "ANALYST_API_KEY";

/// The text-completion backend to call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub provider: String,
    pub model: String,
    /// Base URL. When absent, cloud providers use their public API and
    /// local backends use [`DEFAULT_LOCAL_ENDPOINT`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// Endpoint the backend will actually call.
    pub fn resolved_endpoint(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.trim().trim_end_matches('/').to_string();
        }
        match (self.kind, CloudProvider::parse(&self.provider)) {
            (BackendKind::Cloud, Some(provider)) => provider.default_endpoint().to_string(),
            _ => DEFAULT_LOCAL_ENDPOINT.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_ms == 0 {
            return Err("backend.timeout_ms must be > 0".to_string());
        }
        if self.endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
            return Err("backend.endpoint must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("backend.model must not be empty".to_string());
        }
        if self.kind == BackendKind::Cloud && CloudProvider::parse(&self.provider).is_none() {
            return Err(format!(
                "backend.provider must be anthropic or openai for a cloud backend, got {:?}",
                self.provider
            ));
        }
        Ok(())
    }
}

/// Top-level configuration of an [`crate::Analyzer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystConfig {
    /// Maximum number of concurrent analyses in a bulk run.
    pub bulk_concurrency: usize,
    /// Results with fewer tags get the sport vocabulary appended.
    pub min_ai_tags: usize,
    pub backend: BackendConfig,
    pub weights: CompositeWeights,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            min_ai_tags: DEFAULT_MIN_AI_TAGS,
            backend: BackendConfig::default(),
            weights: CompositeWeights::default(),
        }
    }
}

impl AnalystConfig {
    /// Built-in defaults overlaid with `ANALYST_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|name| env::var(name).ok());
        config
    }

    /// Parse a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::load_with(path, |name| env::var(name).ok())
    }

    /// Parse a TOML file, then apply overrides from `lookup`.
    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_overrides(lookup);
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// Unparseable values are ignored with a warning rather than rejected.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let backend = &mut self.backend;
        if let Some(kind) = lookup(ENV_BACKEND_KIND) {
            match kind.parse() {
                Ok(kind) => backend.kind = kind,
                Err(e) => warn!(var = ENV_BACKEND_KIND, error = %e, "ignoring override"),
            }
        }
        if let Some(provider) = lookup(ENV_PROVIDER) {
            backend.provider = provider;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            backend.model = model;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            backend.endpoint = Some(endpoint);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            match timeout.trim().parse() {
                Ok(ms) => backend.timeout_ms = ms,
                Err(e) => warn!(var = ENV_TIMEOUT_MS, error = %e, "ignoring override"),
            }
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            backend.api_key = Some(key);
        }
    }

    /// Validate every section; return an error string if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.backend.validate()?;
        if self.bulk_concurrency == 0 {
            return Err("bulk_concurrency must be > 0".to_string());
        }
        self.weights.validate().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Immutable descriptor of the configured backend.
    pub fn descriptor(&self) -> ModelBackendDescriptor {
        ModelBackendDescriptor {
            kind: self.backend.kind,
            provider_id: self.backend.provider.trim().to_lowercase(),
            model_id: self.backend.model.clone(),
            endpoint_ref: self.backend.resolved_endpoint(),
            timeout_ms: self.backend.timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AnalystConfig::default();
        assert!(config.validate().is_ok());
        let descriptor = config.descriptor();
        assert_eq!(descriptor.kind, BackendKind::Local);
        assert_eq!(descriptor.provider_id, "go4it-ai-engine");
        assert_eq!(descriptor.model_id, "sports-analysis-v1");
        assert_eq!(descriptor.endpoint_ref, "http://localhost:8080/v1");
        assert_eq!(descriptor.timeout_ms, 30_000);
        assert_eq!(config.bulk_concurrency, 3);
        assert_eq!(config.min_ai_tags, 3);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = AnalystConfig::default();
        config.apply_overrides(overrides(&[
            ("ANALYST_BACKEND_KIND", "cloud"),
            ("ANALYST_PROVIDER", "Anthropic"),
            ("ANALYST_MODEL", "claude-sonnet-4-20250514"),
            ("ANALYST_TIMEOUT_MS", "5000"),
            ("ANALYST_API_KEY", "sk-test"),
        ]));
        assert!(config.validate().is_ok());
        let descriptor = config.descriptor();
        assert_eq!(descriptor.kind, BackendKind::Cloud);
        assert_eq!(descriptor.provider_id, "anthropic");
        assert_eq!(descriptor.endpoint_ref, "https://api.anthropic.com/v1");
        assert_eq!(descriptor.timeout_ms, 5_000);
        assert_eq!(config.backend.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_override_is_ignored() {
        let mut config = AnalystConfig::default();
        config.apply_overrides(overrides(&[
            ("ANALYST_BACKEND_KIND", "mainframe"),
            ("ANALYST_TIMEOUT_MS", "soon"),
        ]));
        assert_eq!(config.backend.kind, BackendKind::Local);
        assert_eq!(config.backend.timeout_ms, 30_000);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AnalystConfig::default();
        config.backend.timeout_ms = 0;
        assert!(config.validate().unwrap_err().contains("timeout_ms"));

        let mut config = AnalystConfig::default();
        config.bulk_concurrency = 0;
        assert!(config.validate().unwrap_err().contains("bulk_concurrency"));

        let mut config = AnalystConfig::default();
        config.backend.endpoint = Some("  ".into());
        assert!(config.validate().unwrap_err().contains("endpoint"));

        let mut config = AnalystConfig::default();
        config.backend.kind = BackendKind::Cloud;
        assert!(config.validate().unwrap_err().contains("provider"));

        let mut config = AnalystConfig::default();
        config.weights.injury_risk = 0.5;
        assert!(config.validate().unwrap_err().contains("sum"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AnalystConfig = toml::from_str(
            r#"
            min_ai_tags = 5

            [backend]
            endpoint = "http://gpu-box:9000/v1/"
            "#,
        )
        .unwrap();
        assert_eq!(config.min_ai_tags, 5);
        assert_eq!(config.bulk_concurrency, 3);
        assert_eq!(config.backend.model, "sports-analysis-v1");
        assert_eq!(config.descriptor().endpoint_ref, "http://gpu-box:9000/v1");
        assert_eq!(config.weights, CompositeWeights::default());
    }

    #[test]
    fn api_key_is_not_serialized() {
        let mut config = AnalystConfig::default();
        config.backend.api_key = Some("secret".into());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
