//! Inference backend abstraction.
//!
//! Two backend kinds exist:
//! - On-device: a local engine with a limited context window (Ollama)
//! - Remote: a network-hosted engine with larger context (OpenAI-compatible APIs)
//!
//! Backends are injected into the prober, router and session manager as
//! `Arc<dyn InferenceBackend>` so tests can substitute a scripted backend.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Readiness of an inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityState {
    /// Engine is absent or cannot be used.
    Unavailable,
    /// Engine is present but its model must be downloaded first.
    Downloadable,
    /// Model download is in progress.
    Downloading,
    /// Engine is ready to create sessions.
    Available,
}

impl CapabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityState::Unavailable => "unavailable",
            CapabilityState::Downloadable => "downloadable",
            CapabilityState::Downloading => "downloading",
            CapabilityState::Available => "available",
        }
    }
}

impl std::fmt::Display for CapabilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which class of backend serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    OnDevice,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OnDevice => "on-device",
            BackendKind::Remote => "remote",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The backend could not even determine its readiness.
///
/// Never surfaced to users: the prober downgrades it to `Unavailable`.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Engine unreachable: {0}")]
    Unreachable(String),

    #[error("Unexpected capability response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by a backend while creating a session or prompting it.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Backend not ready ({state}): {hint}")]
    NotReady { state: CapabilityState, hint: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Session already released")]
    Released,
}

/// A single-owner session bound to one backend and one system instruction.
#[async_trait]
pub trait InferenceSession: Send {
    /// Send one prompt and return the raw completion text.
    async fn prompt(&mut self, text: &str) -> Result<String, BackendError>;

    /// Release backend resources held by this session.
    ///
    /// Synchronous so it can run from `Drop` on cancellation.
    fn release(&mut self);
}

/// Owned session handle as handed out by backends.
pub type SessionBox = Box<dyn InferenceSession>;

/// An inference engine that can report readiness and open sessions.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Which kind of backend this is.
    fn kind(&self) -> BackendKind;

    /// Short identifier for logs and status output (e.g. "ollama", "Groq").
    fn name(&self) -> &str;

    /// Query readiness. Absence is a state, not an error; errors mean the
    /// state could not be determined at all.
    async fn probe(&self) -> Result<CapabilityState, CapabilityError>;

    /// Open a session with an optional system instruction.
    async fn create_session(
        &self,
        system_instruction: Option<&str>,
    ) -> Result<SessionBox, BackendError>;

    /// What the user needs to do to make this backend usable.
    fn availability_hint(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_display() {
        assert_eq!(CapabilityState::Available.to_string(), "available");
        assert_eq!(CapabilityState::Downloading.to_string(), "downloading");
    }

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::OnDevice.to_string(), "on-device");
    }
}
