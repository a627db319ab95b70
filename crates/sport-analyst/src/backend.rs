//! Model backend adapter.
//!
//! A [`ModelBackend`] is an opaque text-completion service. The
//! [`BackendAdapter`] wraps one and gives the pipeline a call that never fails
//! for availability reasons:
//!
//! ```text
//! complete() ──ok──────────────────────────► Invocation { source: Backend }
//!     │
//!     ├─ timeout / transport / status / malformed ─► Invocation { source: Fallback }
//!     │
//!     └─ missing credentials ─┬─ local ─► Invocation { source: Fallback }
//!                             └─ cloud ─► AnalysisError::Configuration
//! ```
//!
//! There are no retries. A failed call degrades immediately, so worst-case
//! latency is one backend round trip bounded by the descriptor timeout.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{MediaKind, ResultSource, FALLBACK_RESPONSE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{AnalysisError, BackendError};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_COMPLETION_TOKENS: u32 = 2_048;
const TEMPERATURE: f64 = 0.2;

const SYSTEM_PROMPT: &str = "You are an expert sports performance analyst. \
Answer only in the output format requested by the user, using the exact section headers.";

/// Where a backend runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Self-hosted OpenAI-compatible server.
    #[default]
    Local,
    /// Hosted provider API that requires credentials.
    Cloud,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(format!("unknown backend kind: {other}")),
        }
    }
}

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Anthropic,
    OpenAi,
}

impl CloudProvider {
    pub fn parse(provider_id: &str) -> Option<Self> {
        match provider_id.trim().to_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Public API base URL used when no endpoint is configured.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Immutable description of a configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelBackendDescriptor {
    pub kind: BackendKind,
    pub provider_id: String,
    pub model_id: String,
    /// Base URL, without a trailing slash.
    pub endpoint_ref: String,
    pub timeout_ms: u64,
}

impl ModelBackendDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint_ref.trim_end_matches('/'), path)
    }
}

/// Per-call context forwarded to the backend alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationContext {
    pub subject_ref: String,
    pub media_kind: MediaKind,
}

impl InvocationContext {
    fn system_prompt(&self) -> String {
        format!(
            "{SYSTEM_PROMPT}\nContent type: {}. Content reference: {}.",
            self.media_kind, self.subject_ref
        )
    }
}

/// A text-completion service.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn descriptor(&self) -> &ModelBackendDescriptor;

    /// Complete `prompt` and return the raw response text.
    async fn complete(
        &self,
        prompt: &str,
        context: &InvocationContext,
    ) -> Result<String, BackendError>;

    /// Cheap reachability check.
    async fn probe(&self) -> Result<(), BackendError>;
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, BackendError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status { status, body });
    }
    response
        .json()
        .await
        .map_err(|e| BackendError::Malformed(e.to_string()))
}

fn non_empty(text: Option<&str>, what: &str) -> Result<String, BackendError> {
    match text.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(BackendError::Malformed(format!("no completion text at {what}"))),
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), BackendError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(BackendError::Status {
            status: response.status().as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}

/// Self-hosted OpenAI-compatible chat-completions server.
pub struct LocalBackend {
    descriptor: ModelBackendDescriptor,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LocalBackend {
    pub fn new(descriptor: ModelBackendDescriptor, api_key: Option<String>) -> Self {
        Self {
            descriptor,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: reqwest::Client::new(),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    fn descriptor(&self) -> &ModelBackendDescriptor {
        &self.descriptor
    }

    async fn complete(
        &self,
        prompt: &str,
        context: &InvocationContext,
    ) -> Result<String, BackendError> {
        let request_body = serde_json::json!({
            "model": self.descriptor.model_id,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [
                { "role": "system", "content": context.system_prompt() },
                { "role": "user", "content": prompt }
            ]
        });

        let response = self
            .authorize(self.client.post(self.descriptor.url("chat/completions")))
            .json(&request_body)
            .send()
            .await?;

        let resp_json = read_json(response).await?;
        non_empty(
            resp_json["choices"][0]["message"]["content"].as_str(),
            "choices[0].message.content",
        )
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.get(self.descriptor.url("models")))
            .send()
            .await?;
        check_status(response).await
    }
}

/// Hosted provider API.
pub struct CloudBackend {
    descriptor: ModelBackendDescriptor,
    provider: CloudProvider,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl CloudBackend {
    /// Fails when the descriptor names a provider this backend cannot speak.
    pub fn new(
        descriptor: ModelBackendDescriptor,
        api_key: Option<String>,
    ) -> Result<Self, AnalysisError> {
        let provider = CloudProvider::parse(&descriptor.provider_id).ok_or_else(|| {
            AnalysisError::Configuration(format!(
                "unsupported cloud provider: {}",
                descriptor.provider_id
            ))
        })?;
        Ok(Self {
            descriptor,
            provider,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: reqwest::Client::new(),
        })
    }

    fn api_key(&self) -> Result<&str, BackendError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| BackendError::MissingCredentials(self.provider.to_string()))
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        api_key: &str,
    ) -> reqwest::RequestBuilder {
        match self.provider {
            CloudProvider::Anthropic => request
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            CloudProvider::OpenAi => request.bearer_auth(api_key),
        }
    }
}

#[async_trait]
impl ModelBackend for CloudBackend {
    fn descriptor(&self) -> &ModelBackendDescriptor {
        &self.descriptor
    }

    async fn complete(
        &self,
        prompt: &str,
        context: &InvocationContext,
    ) -> Result<String, BackendError> {
        let api_key = self.api_key()?;

        match self.provider {
            CloudProvider::Anthropic => {
                let request_body = serde_json::json!({
                    "model": self.descriptor.model_id,
                    "max_tokens": MAX_COMPLETION_TOKENS,
                    "temperature": TEMPERATURE,
                    "system": context.system_prompt(),
                    "messages": [{ "role": "user", "content": prompt }]
                });
                let response = self
                    .authorize(self.client.post(self.descriptor.url("messages")), api_key)
                    .json(&request_body)
                    .send()
                    .await?;
                let resp_json = read_json(response).await?;
                non_empty(resp_json["content"][0]["text"].as_str(), "content[0].text")
            }
            CloudProvider::OpenAi => {
                let request_body = serde_json::json!({
                    "model": self.descriptor.model_id,
                    "max_tokens": MAX_COMPLETION_TOKENS,
                    "temperature": TEMPERATURE,
                    "messages": [
                        { "role": "system", "content": context.system_prompt() },
                        { "role": "user", "content": prompt }
                    ]
                });
                let response = self
                    .authorize(
                        self.client.post(self.descriptor.url("chat/completions")),
                        api_key,
                    )
                    .json(&request_body)
                    .send()
                    .await?;
                let resp_json = read_json(response).await?;
                non_empty(
                    resp_json["choices"][0]["message"]["content"].as_str(),
                    "choices[0].message.content",
                )
            }
        }
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let api_key = self.api_key()?;
        let response = self
            .authorize(self.client.get(self.descriptor.url("models")), api_key)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Outcome of one adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub text: String,
    pub source: ResultSource,
    pub latency_ms: u64,
}

/// Backend reachability as reported by [`BackendAdapter::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub available: bool,
    pub latency_ms: u64,
    pub kind: BackendKind,
    pub provider_id: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Timeout and fallback policy around a [`ModelBackend`].
#[derive(Clone)]
pub struct BackendAdapter {
    backend: Arc<dyn ModelBackend>,
}

impl BackendAdapter {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    pub fn descriptor(&self) -> &ModelBackendDescriptor {
        self.backend.descriptor()
    }

    /// Invoke the backend once.
    ///
    /// Only a cloud backend without credentials produces an error; every other
    /// failure yields [`FALLBACK_RESPONSE`].
    pub async fn invoke(
        &self,
        prompt: &str,
        context: &InvocationContext,
    ) -> Result<Invocation, AnalysisError> {
        let descriptor = self.backend.descriptor();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(
            descriptor.timeout(),
            self.backend.complete(prompt, context),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout(descriptor.timeout_ms)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                debug!(
                    provider = %descriptor.provider_id,
                    latency_ms,
                    chars = text.len(),
                    "backend completion received"
                );
                Ok(Invocation {
                    text,
                    source: ResultSource::Backend,
                    latency_ms,
                })
            }
            Err(err) if err.is_missing_credentials() && descriptor.kind == BackendKind::Cloud => {
                Err(AnalysisError::Configuration(err.to_string()))
            }
            Err(err) => {
                warn!(
                    kind = %descriptor.kind,
                    provider = %descriptor.provider_id,
                    latency_ms,
                    error = %err,
                    "backend unavailable, using fallback response"
                );
                Ok(Invocation {
                    text: FALLBACK_RESPONSE.to_string(),
                    source: ResultSource::Fallback,
                    latency_ms,
                })
            }
        }
    }

    /// Probe the backend within the descriptor timeout. Never fails.
    pub async fn health_check(&self) -> BackendHealth {
        let descriptor = self.backend.descriptor();
        let started = Instant::now();
        let outcome = match tokio::time::timeout(descriptor.timeout(), self.backend.probe()).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout(descriptor.timeout_ms)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        BackendHealth {
            available: outcome.is_ok(),
            latency_ms,
            kind: descriptor.kind,
            provider_id: descriptor.provider_id.clone(),
            model_id: descriptor.model_id.clone(),
            error: outcome.err().map(|e| e.to_string()),
        }
    }
}

/// Build the backend a descriptor names.
pub fn build_backend(
    descriptor: ModelBackendDescriptor,
    api_key: Option<String>,
) -> Result<Arc<dyn ModelBackend>, AnalysisError> {
    Ok(match descriptor.kind {
        BackendKind::Local => Arc::new(LocalBackend::new(descriptor, api_key)),
        BackendKind::Cloud => Arc::new(CloudBackend::new(descriptor, api_key)?),
    })
}
