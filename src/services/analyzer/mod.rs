//! Document analysis service.
//!
//! Ties the inference layer together for callers: route, open a session,
//! budget the input, prompt, parse. Owns the fallback policy: a request
//! that fails on-device is retried once on the remote backend when
//! `fallback_to_remote` is set and the remote backend is ready.

mod types;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::extract::{self, ExtractionError, PageText};
use crate::llm::prompts::{
    self, ANALYSIS_SYSTEM_PROMPT, ANSWER_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT,
};
use crate::llm::{
    parse_analysis, parse_plain_answer, parse_summary, BackendError, BackendKind,
    CapabilityProber, CapabilityState, InferenceBackend, InferenceError, InferenceRouter,
    LlmAppConfig, LlmConfig, OllamaBackend, OpenAiBackend, ParseError, RoutingDecision,
    RoutingReason, SessionManager, TaskClass,
};
use crate::models::{AnalysisRecord, SummaryLength};

pub use types::{AnalysisError, DocumentAnalysis};

/// Analyzes, summarizes and answers questions about documents.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    router: InferenceRouter,
    sessions: SessionManager,
    app: LlmAppConfig,
}

impl DocumentAnalyzer {
    /// Create an analyzer over explicit backends.
    pub fn new(
        on_device: Option<Arc<dyn InferenceBackend>>,
        remote: Option<Arc<dyn InferenceBackend>>,
        app: LlmAppConfig,
    ) -> Self {
        Self {
            router: InferenceRouter::new(CapabilityProber::new(on_device.clone())),
            sessions: SessionManager::new(on_device, remote),
            app,
        }
    }

    /// Create an analyzer with the Ollama and OpenAI-compatible backends.
    ///
    /// Nothing is contacted here; readiness is probed per request.
    pub fn from_config(config: &LlmConfig) -> Result<Self, BackendError> {
        let on_device: Option<Arc<dyn InferenceBackend>> = if config.on_device_enabled() {
            Some(Arc::new(OllamaBackend::new(config)?))
        } else {
            None
        };
        let remote: Option<Arc<dyn InferenceBackend>> = if config.enabled() {
            Some(Arc::new(OpenAiBackend::new(config)?))
        } else {
            None
        };
        Ok(Self::new(on_device, remote, config.app.clone()))
    }

    pub fn router(&self) -> &InferenceRouter {
        &self.router
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Produce a structured analysis of page-segmented text.
    pub async fn analyze(&self, pages: &[PageText]) -> Result<AnalysisRecord, AnalysisError> {
        let text = extract::join_pages(pages);
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput("document text"));
        }

        let content = self.app.budget().for_analysis(&text);
        let task = self.task_for(TaskClass::Analyze, &content);
        let prompt = prompts::analysis_prompt(self.app.get_analysis_prompt(), &content);

        let record = self
            .run(task, ANALYSIS_SYSTEM_PROMPT, prompt, parse_analysis)
            .await?;
        info!(
            "Analyzed \"{}\": {} sections, {} findings",
            record.title,
            record.sections.len(),
            record.key_findings.len()
        );
        Ok(record)
    }

    /// Summarize text at the requested length.
    pub async fn summarize(
        &self,
        text: &str,
        length: SummaryLength,
    ) -> Result<String, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput("text"));
        }

        let content = self.app.budget().for_summary(text);
        let task = self.task_for(TaskClass::Summarize, &content);
        let prompt = prompts::summary_prompt(self.app.get_summary_prompt(), &content, length);

        self.run(task, SUMMARY_SYSTEM_PROMPT, prompt, parse_summary)
            .await
    }

    /// Answer one question from the given context.
    pub async fn answer(&self, question: &str, context: &str) -> Result<String, AnalysisError> {
        if question.trim().is_empty() {
            return Err(AnalysisError::EmptyInput("question"));
        }
        if context.trim().is_empty() {
            return Err(AnalysisError::EmptyInput("context"));
        }

        let context = self.app.budget().for_answer(context);
        let task = self.task_for(TaskClass::Answer, &context);
        let prompt = prompts::answer_prompt(self.app.get_answer_prompt(), question, &context);

        self.run(task, ANSWER_SYSTEM_PROMPT, prompt, parse_plain_answer)
            .await
    }

    /// Extract a file and analyze it.
    ///
    /// Only extraction failures are errors here. An analysis failure is
    /// returned inside [`DocumentAnalysis`] next to the extracted text.
    pub async fn analyze_document(&self, path: &Path) -> Result<DocumentAnalysis, ExtractionError> {
        let extractor = extract::extractor_for(path)?;
        debug!("Extracting {} with {}", path.display(), extractor.name());
        let document = extractor.extract(path).await?;

        let analysis = self.analyze(&document.pages).await;
        if let Err(e) = &analysis {
            warn!(
                "Analysis of {} failed, keeping extracted text: {}",
                path.display(),
                e
            );
        }

        Ok(DocumentAnalysis {
            document,
            analysis,
            analyzed_at: Utc::now(),
        })
    }

    /// Budgeted inputs still beyond the on-device window are routed as
    /// long-context.
    fn task_for(&self, task: TaskClass, input: &str) -> TaskClass {
        if input.chars().count() > self.app.on_device_context_chars {
            TaskClass::LongContext
        } else {
            task
        }
    }

    async fn run<T>(
        &self,
        task: TaskClass,
        system: &'static str,
        prompt: String,
        parse: fn(&str) -> Result<T, ParseError>,
    ) -> Result<T, AnalysisError> {
        let decision = self.router.route(task).await;

        let err = match self.attempt(decision, system, prompt.clone(), parse).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if !self.should_fall_back(decision).await {
            return Err(err);
        }

        warn!("On-device {} failed, retrying on remote: {}", task, err);
        let fallback = RoutingDecision::remote(RoutingReason::PrimaryUnavailable);
        self.attempt(fallback, system, prompt, parse).await
    }

    async fn attempt<T>(
        &self,
        decision: RoutingDecision,
        system: &'static str,
        prompt: String,
        parse: fn(&str) -> Result<T, ParseError>,
    ) -> Result<T, AnalysisError> {
        let raw = self
            .complete(decision.backend, system, prompt)
            .await
            .map_err(|source| AnalysisError::Inference { decision, source })?;
        parse(&raw).map_err(|source| AnalysisError::Parse { decision, source })
    }

    async fn complete(
        &self,
        kind: BackendKind,
        system: &str,
        prompt: String,
    ) -> Result<String, InferenceError> {
        self.sessions
            .with_session(kind, Some(system), move |session| {
                Box::pin(async move { session.prompt(&prompt).await })
            })
            .await
    }

    async fn should_fall_back(&self, decision: RoutingDecision) -> bool {
        if decision.backend != BackendKind::OnDevice || !self.app.fallback_to_remote {
            return false;
        }
        let Some(remote) = self.sessions.backend(BackendKind::Remote) else {
            return false;
        };
        match remote.probe().await {
            Ok(CapabilityState::Available) => true,
            Ok(state) => {
                debug!("Remote backend {} is {}, not falling back", remote.name(), state);
                false
            }
            Err(e) => {
                debug!("Remote backend {} probe failed: {}", remote.name(), e);
                false
            }
        }
    }
}
