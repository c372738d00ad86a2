//! Per-request backend selection.

use serde::Serialize;
use tracing::debug;

use super::backend::{BackendKind, CapabilityState};
use super::capability::CapabilityProber;

/// Classification of a request, used to decide eligible backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskClass {
    /// Structured analysis of document text.
    Analyze,
    /// Analysis that includes page images.
    AnalyzeWithImages,
    /// Input larger than the on-device context window.
    LongContext,
    /// Free-form summary.
    Summarize,
    /// Single question answered from supplied context.
    Answer,
}

impl TaskClass {
    pub const ALL: [TaskClass; 5] = [
        TaskClass::Analyze,
        TaskClass::AnalyzeWithImages,
        TaskClass::LongContext,
        TaskClass::Summarize,
        TaskClass::Answer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskClass::Analyze => "analyze",
            TaskClass::AnalyzeWithImages => "analyze-with-images",
            TaskClass::LongContext => "long-context",
            TaskClass::Summarize => "summarize",
            TaskClass::Answer => "answer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "analyze" => Some(TaskClass::Analyze),
            "analyze-with-images" | "multimodal" => Some(TaskClass::AnalyzeWithImages),
            "long-context" => Some(TaskClass::LongContext),
            "summarize" => Some(TaskClass::Summarize),
            "answer" | "ask" => Some(TaskClass::Answer),
            _ => None,
        }
    }

    /// Whether the task needs something the on-device engine cannot provide.
    pub fn requires_remote(&self) -> bool {
        matches!(self, TaskClass::AnalyzeWithImages | TaskClass::LongContext)
    }
}

impl std::fmt::Display for TaskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a backend was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingReason {
    PrimaryAvailable,
    PrimaryUnavailable,
    TaskRequiresRemote,
}

impl RoutingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingReason::PrimaryAvailable => "primary-available",
            RoutingReason::PrimaryUnavailable => "primary-unavailable",
            RoutingReason::TaskRequiresRemote => "task-requires-remote",
        }
    }
}

impl std::fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of routing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub backend: BackendKind,
    pub reason: RoutingReason,
}

impl RoutingDecision {
    pub fn on_device() -> Self {
        Self {
            backend: BackendKind::OnDevice,
            reason: RoutingReason::PrimaryAvailable,
        }
    }

    pub fn remote(reason: RoutingReason) -> Self {
        Self {
            backend: BackendKind::Remote,
            reason,
        }
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.backend, self.reason)
    }
}

/// Chooses on-device or remote inference for each request.
///
/// Routing is single-shot: it never retries or falls back by itself.
#[derive(Clone)]
pub struct InferenceRouter {
    prober: CapabilityProber,
}

impl InferenceRouter {
    pub fn new(prober: CapabilityProber) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &CapabilityProber {
        &self.prober
    }

    /// Decide which backend serves a request of the given class.
    pub async fn route(&self, task: TaskClass) -> RoutingDecision {
        let decision = if task.requires_remote() {
            RoutingDecision::remote(RoutingReason::TaskRequiresRemote)
        } else {
            match self.prober.probe().await {
                CapabilityState::Available => RoutingDecision::on_device(),
                _ => RoutingDecision::remote(RoutingReason::PrimaryUnavailable),
            }
        };
        debug!("Routed {} to {}", task, decision);
        decision
    }
}
