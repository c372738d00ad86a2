//! Inference configuration.
//!
//! Split into two tiers:
//! - `LlmAppConfig`: from the config file (what the models are asked to do)
//! - `LlmDeviceConfig`: from env vars (how to reach the backends on this machine)
//!
//! Env vars: PAPERLENS_LOCAL_ENDPOINT (or OLLAMA_HOST), PAPERLENS_LOCAL_MODEL,
//! PAPERLENS_REMOTE_PROVIDER, PAPERLENS_REMOTE_ENDPOINT, PAPERLENS_REMOTE_MODEL,
//! PAPERLENS_API_KEY (GROQ_API_KEY / OPENAI_API_KEY are auto-detected)

use serde::{Deserialize, Serialize};

use super::budget::{InputBudget, DEFAULT_ANALYSIS_CHARS, DEFAULT_ANSWER_CHARS, DEFAULT_SUMMARY_CHARS};
use super::prompts::{DEFAULT_ANALYSIS_PROMPT, DEFAULT_ANSWER_PROMPT, DEFAULT_SUMMARY_PROMPT};

/// OpenAI-compatible remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProvider {
    #[default]
    OpenAI,
    Groq,
    Together,
}

impl RemoteProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "groq" => Some(Self::Groq),
            "together" => Some(Self::Together),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RemoteProvider::OpenAI => "OpenAI",
            RemoteProvider::Groq => "Groq",
            RemoteProvider::Together => "Together.ai",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            RemoteProvider::OpenAI => "https://api.openai.com",
            RemoteProvider::Groq => "https://api.groq.com/openai",
            RemoteProvider::Together => "https://api.together.xyz",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            RemoteProvider::OpenAI => "gpt-4o-mini",
            RemoteProvider::Groq => "llama-3.3-70b-versatile",
            RemoteProvider::Together => "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
        }
    }

    /// Provider-specific API key env var, if any.
    fn key_env_var(&self) -> Option<&'static str> {
        match self {
            RemoteProvider::OpenAI => Some("OPENAI_API_KEY"),
            RemoteProvider::Groq => Some("GROQ_API_KEY"),
            RemoteProvider::Together => None,
        }
    }
}

/// Application-level settings (from the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAppConfig {
    /// Whether AI analysis is enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether to use the on-device engine when it is ready
    #[serde(default = "default_true")]
    pub on_device: bool,
    /// Maximum tokens in a structured analysis response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum characters of document text sent for analysis
    #[serde(default = "default_analysis_max_chars")]
    pub analysis_max_chars: usize,
    /// Maximum characters of text sent for summarization
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
    /// Maximum characters of context sent with a question
    #[serde(default = "default_answer_max_chars")]
    pub answer_max_chars: usize,
    /// Inputs longer than this are routed as long-context requests
    #[serde(default = "default_on_device_context_chars")]
    pub on_device_context_chars: usize,
    /// Retry once on the remote backend when an on-device request fails
    #[serde(default = "default_true")]
    pub fallback_to_remote: bool,
    /// HTTP timeout for inference calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Custom analysis prompt (uses {content} placeholder)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_prompt: Option<String>,
    /// Custom summary prompt (uses {length} and {content} placeholders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_prompt: Option<String>,
    /// Custom answer prompt (uses {context} and {question} placeholders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_prompt: Option<String>,
}

/// Device-level settings (from env vars).
#[derive(Debug, Clone, PartialEq)]
pub struct LlmDeviceConfig {
    /// Ollama endpoint for the on-device engine
    pub local_endpoint: String,
    /// Model served by the on-device engine
    pub local_model: String,
    /// Remote provider
    pub remote_provider: RemoteProvider,
    /// Remote API base URL
    pub remote_endpoint: String,
    /// Remote model ID
    pub remote_model: String,
    /// Remote API key
    pub api_key: Option<String>,
}

/// Combined runtime configuration.
///
/// Only the app tier is (de)serialized; the device tier comes from env.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(flatten)]
    pub app: LlmAppConfig,
    #[serde(skip)]
    pub device: LlmDeviceConfig,
}

fn default_true() -> bool {
    true
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.2
}

fn default_analysis_max_chars() -> usize {
    DEFAULT_ANALYSIS_CHARS
}

fn default_summary_max_chars() -> usize {
    DEFAULT_SUMMARY_CHARS
}

fn default_answer_max_chars() -> usize {
    DEFAULT_ANSWER_CHARS
}

fn default_on_device_context_chars() -> usize {
    24_000
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_local_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "llama3.2:3b".to_string()
}

// === LlmAppConfig implementations ===

impl Default for LlmAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            on_device: true,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            analysis_max_chars: default_analysis_max_chars(),
            summary_max_chars: default_summary_max_chars(),
            answer_max_chars: default_answer_max_chars(),
            on_device_context_chars: default_on_device_context_chars(),
            fallback_to_remote: true,
            request_timeout_secs: default_request_timeout_secs(),
            analysis_prompt: None,
            summary_prompt: None,
            answer_prompt: None,
        }
    }
}

impl LlmAppConfig {
    pub fn budget(&self) -> InputBudget {
        InputBudget {
            analysis_chars: self.analysis_max_chars,
            summary_chars: self.summary_max_chars,
            answer_chars: self.answer_max_chars,
        }
    }

    pub fn get_analysis_prompt(&self) -> &str {
        self.analysis_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
    }

    pub fn get_summary_prompt(&self) -> &str {
        self.summary_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SUMMARY_PROMPT)
    }

    pub fn get_answer_prompt(&self) -> &str {
        self.answer_prompt.as_deref().unwrap_or(DEFAULT_ANSWER_PROMPT)
    }
}

// === LlmDeviceConfig implementations ===

impl Default for LlmDeviceConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LlmDeviceConfig {
    /// Create device config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create device config from an arbitrary variable lookup.
    ///
    /// An explicit PAPERLENS_REMOTE_PROVIDER wins over auto-detection from
    /// provider API keys.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let local_endpoint = lookup("PAPERLENS_LOCAL_ENDPOINT")
            .or_else(|| lookup("OLLAMA_HOST"))
            .map(|host| normalize_ollama_host(&host))
            .unwrap_or_else(default_local_endpoint);
        let local_model = lookup("PAPERLENS_LOCAL_MODEL").unwrap_or_else(default_local_model);

        let explicit_provider = lookup("PAPERLENS_REMOTE_PROVIDER")
            .as_deref()
            .and_then(RemoteProvider::from_str);
        let mut api_key = lookup("PAPERLENS_API_KEY");

        let remote_provider = match explicit_provider {
            Some(provider) => {
                if api_key.is_none() {
                    api_key = provider.key_env_var().and_then(&lookup);
                }
                provider
            }
            None => {
                let detected = [RemoteProvider::Groq, RemoteProvider::OpenAI]
                    .into_iter()
                    .find_map(|p| p.key_env_var().and_then(&lookup).map(|key| (p, key)));
                match detected {
                    Some((provider, key)) => {
                        if api_key.is_none() {
                            api_key = Some(key);
                        }
                        provider
                    }
                    None => RemoteProvider::default(),
                }
            }
        };

        let remote_endpoint = lookup("PAPERLENS_REMOTE_ENDPOINT")
            .unwrap_or_else(|| remote_provider.default_endpoint().to_string());
        let remote_model = lookup("PAPERLENS_REMOTE_MODEL")
            .unwrap_or_else(|| remote_provider.default_model().to_string());

        Self {
            local_endpoint,
            local_model,
            remote_provider,
            remote_endpoint,
            remote_model,
            api_key,
        }
    }
}

/// OLLAMA_HOST may be given without a scheme (e.g. "0.0.0.0:11434").
fn normalize_ollama_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

// === LlmConfig (combined) implementations ===

impl LlmConfig {
    pub fn new(app: LlmAppConfig, device: LlmDeviceConfig) -> Self {
        Self { app, device }
    }

    pub fn enabled(&self) -> bool {
        self.app.enabled
    }

    /// Whether the on-device engine should be considered at all.
    pub fn on_device_enabled(&self) -> bool {
        self.app.enabled && self.app.on_device
    }

    pub fn remote_configured(&self) -> bool {
        self.device.api_key.is_some()
    }

    pub fn budget(&self) -> InputBudget {
        self.app.budget()
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.app.request_timeout_secs)
    }

    /// Hint for when no remote API key is set.
    pub fn remote_hint(&self) -> String {
        match self.device.remote_provider.key_env_var() {
            Some(var) => format!(
                "{} API key not set. Set {} or PAPERLENS_API_KEY",
                self.device.remote_provider.name(),
                var
            ),
            None => format!(
                "{} API key not set. Set PAPERLENS_API_KEY",
                self.device.remote_provider.name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let device = LlmDeviceConfig::from_lookup(lookup(&[]));
        assert_eq!(device.local_endpoint, "http://localhost:11434");
        assert_eq!(device.local_model, "llama3.2:3b");
        assert_eq!(device.remote_provider, RemoteProvider::OpenAI);
        assert_eq!(device.remote_endpoint, "https://api.openai.com");
        assert!(device.api_key.is_none());
    }

    #[test]
    fn test_groq_key_autodetects_provider() {
        let device = LlmDeviceConfig::from_lookup(lookup(&[("GROQ_API_KEY", "gsk_test")]));
        assert_eq!(device.remote_provider, RemoteProvider::Groq);
        assert_eq!(device.remote_endpoint, "https://api.groq.com/openai");
        assert_eq!(device.remote_model, "llama-3.3-70b-versatile");
        assert_eq!(device.api_key.as_deref(), Some("gsk_test"));
    }

    #[test]
    fn test_explicit_provider_wins() {
        let device = LlmDeviceConfig::from_lookup(lookup(&[
            ("PAPERLENS_REMOTE_PROVIDER", "openai"),
            ("GROQ_API_KEY", "gsk_test"),
            ("OPENAI_API_KEY", "sk_test"),
            ("PAPERLENS_REMOTE_MODEL", "gpt-4o"),
        ]));
        assert_eq!(device.remote_provider, RemoteProvider::OpenAI);
        assert_eq!(device.api_key.as_deref(), Some("sk_test"));
        assert_eq!(device.remote_model, "gpt-4o");
    }

    #[test]
    fn test_ollama_host_without_scheme() {
        let device = LlmDeviceConfig::from_lookup(lookup(&[("OLLAMA_HOST", "10.0.0.5:11434/")]));
        assert_eq!(device.local_endpoint, "http://10.0.0.5:11434");
    }

    #[test]
    fn test_app_config_from_partial_toml() {
        let app: LlmAppConfig = toml::from_str(
            r#"
            analysis_max_chars = 9000
            fallback_to_remote = false
            "#,
        )
        .unwrap();
        assert_eq!(app.analysis_max_chars, 9000);
        assert!(!app.fallback_to_remote);
        assert!(app.enabled);
        assert_eq!(app.budget().summary_chars, DEFAULT_SUMMARY_CHARS);
        assert!(app.get_analysis_prompt().contains("{content}"));
    }

    #[test]
    fn test_on_device_requires_enabled() {
        let mut config = LlmConfig::new(
            LlmAppConfig::default(),
            LlmDeviceConfig::from_lookup(lookup(&[])),
        );
        assert!(config.on_device_enabled());
        config.app.enabled = false;
        assert!(!config.on_device_enabled());
        assert!(!config.remote_configured());
        assert!(config.remote_hint().contains("OPENAI_API_KEY"));
    }
}
