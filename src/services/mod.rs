//! Service layer: the analysis surface used by the CLI and other callers.

pub mod analyzer;

pub use analyzer::{AnalysisError, DocumentAnalysis, DocumentAnalyzer};
