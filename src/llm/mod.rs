//! Inference orchestration.
//!
//! Request flow: router (asks the capability prober) picks a backend, the
//! session manager scopes a session on it, the budgeter trims the input,
//! and the parser turns the completion into a typed value.

pub mod backend;
pub mod budget;
pub mod capability;
pub mod config;
pub mod ollama;
pub mod openai;
pub mod parser;
pub mod prompts;
pub mod router;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
pub mod session;

pub use backend::{
    BackendError, BackendKind, CapabilityError, CapabilityState, InferenceBackend,
    InferenceSession, SessionBox,
};
pub use budget::{truncate, InputBudget, TRUNCATION_MARKER};
pub use capability::CapabilityProber;
pub use config::{LlmAppConfig, LlmConfig, LlmDeviceConfig, RemoteProvider};
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use parser::{parse_analysis, parse_plain_answer, parse_summary, ParseError};
pub use router::{InferenceRouter, RoutingDecision, RoutingReason, TaskClass};
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedBackend;
pub use session::{InferenceError, SessionManager};
