//! Remote inference through an OpenAI-compatible chat completions API.
//!
//! Works with OpenAI, Groq and Together.ai; the provider only changes the
//! base URL, default model and key env var (see `RemoteProvider`).
//!
//! 429 responses are retried with the server's Retry-After (or exponential
//! backoff) up to `MAX_RETRIES` times, then surface as `RateLimited`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{
    BackendError, BackendKind, CapabilityError, CapabilityState, InferenceBackend,
    InferenceSession, SessionBox,
};
use super::config::LlmConfig;

/// Maximum retry attempts on rate limit errors.
const MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff when no Retry-After is sent.
const BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound on any single rate-limit wait.
const MAX_WAIT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Delay for a Retry-After header given in seconds.
fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(MAX_WAIT_SECS)))
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1 << attempt.min(6));
    Duration::from_millis(ms.min(MAX_WAIT_SECS * 1000))
}

/// Pull the completion text out of a decoded response.
fn completion_text(response: ChatResponse) -> Result<String, BackendError> {
    if let Some(error) = response.error {
        return Err(BackendError::Api(error.message));
    }
    response
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message.content)
        .ok_or_else(|| BackendError::InvalidResponse("response contained no choices".to_string()))
}

/// OpenAI-compatible remote engine.
pub struct OpenAiBackend {
    client: Client,
    provider_name: &'static str,
    url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    hint: String,
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider_name: config.device.remote_provider.name(),
            url: format!(
                "{}/v1/chat/completions",
                config.device.remote_endpoint.trim_end_matches('/')
            ),
            model: config.device.remote_model.clone(),
            api_key: config.device.api_key.clone(),
            max_tokens: config.app.max_tokens,
            temperature: config.app.temperature,
            hint: config.remote_hint(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl InferenceBackend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn name(&self) -> &str {
        self.provider_name
    }

    async fn probe(&self) -> Result<CapabilityState, CapabilityError> {
        Ok(if self.api_key.is_some() {
            CapabilityState::Available
        } else {
            CapabilityState::Unavailable
        })
    }

    async fn create_session(
        &self,
        system_instruction: Option<&str>,
    ) -> Result<SessionBox, BackendError> {
        let Some(api_key) = self.api_key.clone() else {
            return Err(BackendError::NotReady {
                state: CapabilityState::Unavailable,
                hint: self.availability_hint(),
            });
        };

        Ok(Box::new(ChatSession {
            client: self.client.clone(),
            provider_name: self.provider_name,
            url: self.url.clone(),
            model: self.model.clone(),
            api_key,
            system: system_instruction.map(str::to_string),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            released: false,
        }))
    }

    fn availability_hint(&self) -> String {
        self.hint.clone()
    }
}

struct ChatSession {
    client: Client,
    provider_name: &'static str,
    url: String,
    model: String,
    api_key: String,
    system: Option<String>,
    max_tokens: u32,
    temperature: f32,
    released: bool,
}

impl ChatSession {
    fn request<'a>(&'a self, text: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: text,
        });
        ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl InferenceSession for ChatSession {
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError> {
        if self.released {
            return Err(BackendError::Released);
        }

        let request = self.request(text);
        debug!(
            "Sending {} chars to {} ({})",
            text.len(),
            self.provider_name,
            self.model
        );

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| BackendError::Connection(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok());
                let wait = parse_retry_after(retry_after);

                if attempt >= MAX_RETRIES {
                    return Err(BackendError::RateLimited {
                        retry_after_secs: wait.map(|d| d.as_secs()),
                    });
                }

                let wait = wait.unwrap_or_else(|| backoff_delay(attempt));
                warn!(
                    "{} rate limited (attempt {}), waiting {:?}",
                    self.provider_name,
                    attempt + 1,
                    wait
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Api(format!(
                    "{} API error ({}): {}",
                    self.provider_name, status, body
                )));
            }

            let chat: ChatResponse = response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

            return completion_text(chat);
        }
    }

    fn release(&mut self) {
        self.released = true;
        self.system = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::config::{LlmAppConfig, LlmDeviceConfig, RemoteProvider};

    fn config(api_key: Option<&str>) -> LlmConfig {
        let mut device = LlmDeviceConfig::from_lookup(|_| None);
        device.remote_provider = RemoteProvider::Groq;
        device.remote_endpoint = "https://api.groq.com/openai/".to_string();
        device.remote_model = "llama-3.3-70b-versatile".to_string();
        device.api_key = api_key.map(str::to_string);
        LlmConfig::new(LlmAppConfig::default(), device)
    }

    #[test]
    fn test_url_joins_endpoint() {
        let backend = OpenAiBackend::new(&config(None)).unwrap();
        assert_eq!(
            backend.url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
        assert_eq!(backend.name(), "Groq");
    }

    #[tokio::test]
    async fn test_probe_follows_api_key() {
        let without = OpenAiBackend::new(&config(None)).unwrap();
        assert_eq!(without.probe().await.unwrap(), CapabilityState::Unavailable);
        assert!(matches!(
            without.create_session(None).await,
            Err(BackendError::NotReady { .. })
        ));
        assert!(without.availability_hint().contains("GROQ_API_KEY"));

        let with = OpenAiBackend::new(&config(Some("gsk_test"))).unwrap();
        assert_eq!(with.probe().await.unwrap(), CapabilityState::Available);
        assert!(with.create_session(Some("sys")).await.is_ok());
    }

    #[test]
    fn test_request_includes_system_message() {
        let session = ChatSession {
            client: Client::new(),
            provider_name: "OpenAI",
            url: String::new(),
            model: "gpt-4o-mini".to_string(),
            api_key: "k".to_string(),
            system: Some("be terse".to_string()),
            max_tokens: 100,
            temperature: 0.0,
            released: false,
        };
        let json = serde_json::to_value(session.request("hello")).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be terse");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
    }

    #[tokio::test]
    async fn test_released_session_refuses_prompts() {
        let backend = OpenAiBackend::new(&config(Some("k"))).unwrap();
        let mut session = backend.create_session(None).await.unwrap();
        session.release();
        assert!(matches!(
            session.prompt("hi").await,
            Err(BackendError::Released)
        ));
    }

    #[test]
    fn test_completion_text() {
        let ok: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#)
                .unwrap();
        assert_eq!(completion_text(ok).unwrap(), "hi");

        let err: ChatResponse =
            serde_json::from_str(r#"{"error":{"message":"model not found","type":"invalid"}}"#)
                .unwrap();
        assert!(matches!(completion_text(err), Err(BackendError::Api(m)) if m == "model not found"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            completion_text(empty),
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_retry_delays() {
        assert_eq!(parse_retry_after(Some(" 7 ")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_rate_limit_waits_are_capped() {
        assert_eq!(parse_retry_after(Some("86400")), Some(Duration::from_secs(60)));
        assert_eq!(backoff_delay(6), Duration::from_secs(60));
        assert_eq!(backoff_delay(40), Duration::from_secs(60));
    }
}
