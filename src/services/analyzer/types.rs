//! Types for the document analyzer.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::extract::ExtractedDocument;
use crate::llm::{InferenceError, ParseError, RoutingDecision};
use crate::models::AnalysisRecord;

/// Failure of an analysis, summary or answer request.
///
/// Inference and parse failures carry the routing decision of the attempt
/// that produced them.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{source} (routed {decision})")]
    Inference {
        decision: RoutingDecision,
        source: InferenceError,
    },

    #[error("{source} (routed {decision})")]
    Parse {
        decision: RoutingDecision,
        source: ParseError,
    },

    #[error("Nothing to send: {0} is empty")]
    EmptyInput(&'static str),
}

impl AnalysisError {
    /// Routing decision of the failed attempt. `None` when nothing was routed.
    pub fn decision(&self) -> Option<RoutingDecision> {
        match self {
            AnalysisError::Inference { decision, .. } | AnalysisError::Parse { decision, .. } => {
                Some(*decision)
            }
            AnalysisError::EmptyInput(_) => None,
        }
    }

    /// Raw model output for parse failures.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            AnalysisError::Parse { source, .. } => Some(source.raw()),
            _ => None,
        }
    }
}

/// Extraction result plus the outcome of analyzing it.
///
/// The extracted text is kept even when analysis fails.
#[derive(Debug)]
pub struct DocumentAnalysis {
    pub document: ExtractedDocument,
    pub analysis: Result<AnalysisRecord, AnalysisError>,
    pub analyzed_at: DateTime<Utc>,
}

impl DocumentAnalysis {
    pub fn succeeded(&self) -> bool {
        self.analysis.is_ok()
    }
}
