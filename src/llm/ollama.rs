//! On-device inference through a local Ollama daemon.
//!
//! Readiness mapping:
//! - daemon unreachable: probe error (callers treat it as unavailable)
//! - configured model listed by `/api/tags`: available
//! - a pull started by this process still running: downloading
//! - otherwise: downloadable (`paperlens pull` fetches the model)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::backend::{
    BackendError, BackendKind, CapabilityError, CapabilityState, InferenceBackend,
    InferenceSession, SessionBox,
};
use super::config::LlmConfig;

/// Timeout for readiness checks, separate from the (long) generation timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    status: String,
}

/// Whether `model` appears in the tag list, allowing an implicit `:latest`.
fn model_listed(models: &[String], model: &str) -> bool {
    models
        .iter()
        .any(|name| name == model || (!model.contains(':') && *name == format!("{}:latest", model)))
}

/// Local Ollama engine.
pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    model: String,
    options: OllamaOptions,
    pulling: Arc<AtomicBool>,
}

impl OllamaBackend {
    /// Create a backend from the device and app configuration.
    pub fn new(config: &LlmConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.device.local_endpoint.trim_end_matches('/').to_string(),
            model: config.device.local_model.clone(),
            options: OllamaOptions {
                temperature: config.app.temperature,
                num_predict: config.app.max_tokens,
            },
            pulling: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// List models installed in the daemon.
    pub async fn list_models(&self) -> Result<Vec<String>, CapabilityError> {
        let url = format!("{}/api/tags", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| CapabilityError::Unreachable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CapabilityError::InvalidResponse(format!(
                "HTTP {}",
                resp.status()
            )));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Download the configured model. Reported as `Downloading` while running.
    pub async fn pull_model(&self) -> Result<(), BackendError> {
        if self.pulling.swap(true, Ordering::SeqCst) {
            return Err(BackendError::NotReady {
                state: CapabilityState::Downloading,
                hint: format!("{} is already being downloaded", self.model),
            });
        }
        let _pulling = PullFlag(self.pulling.clone());

        info!("Pulling {} from {}", self.model, self.endpoint);
        let url = format!("{}/api/pull", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&PullRequest {
                model: &self.model,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("HTTP {}: {}", status, body)));
        }

        let pull: PullResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if pull.status != "success" {
            return Err(BackendError::Api(format!("Pull ended with status {}", pull.status)));
        }
        info!("Pulled {}", self.model);
        Ok(())
    }
}

/// Clears the in-progress flag when a pull ends or is cancelled.
struct PullFlag(Arc<AtomicBool>);

impl Drop for PullFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OnDevice
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn probe(&self) -> Result<CapabilityState, CapabilityError> {
        if self.pulling.load(Ordering::SeqCst) {
            return Ok(CapabilityState::Downloading);
        }
        let models = self.list_models().await?;
        if model_listed(&models, &self.model) {
            Ok(CapabilityState::Available)
        } else {
            debug!("{} not installed ({} models present)", self.model, models.len());
            Ok(CapabilityState::Downloadable)
        }
    }

    async fn create_session(
        &self,
        system_instruction: Option<&str>,
    ) -> Result<SessionBox, BackendError> {
        let state = self
            .probe()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        if state != CapabilityState::Available {
            return Err(BackendError::NotReady {
                state,
                hint: self.availability_hint(),
            });
        }

        Ok(Box::new(OllamaSession {
            client: self.client.clone(),
            url: format!("{}/api/generate", self.endpoint),
            model: self.model.clone(),
            system: system_instruction.map(str::to_string),
            options: self.options,
            released: false,
        }))
    }

    fn availability_hint(&self) -> String {
        if self.pulling.load(Ordering::SeqCst) {
            format!("{} is downloading", self.model)
        } else {
            format!(
                "Ollama not available at {} or model {} not installed. Run: ollama serve && paperlens pull",
                self.endpoint, self.model
            )
        }
    }
}

/// One Ollama request context. Ollama keeps no server-side session, so the
/// system instruction travels with each request.
struct OllamaSession {
    client: Client,
    url: String,
    model: String,
    system: Option<String>,
    options: OllamaOptions,
    released: bool,
}

#[async_trait]
impl InferenceSession for OllamaSession {
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }

        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
            system: self.system.as_deref(),
            stream: false,
            options: self.options,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    fn release(&mut self) {
        self.released = true;
        self.system = None;
    }
}
