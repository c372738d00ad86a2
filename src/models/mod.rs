//! Data models for paperlens.

mod analysis;

pub use analysis::{AnalysisRecord, Section, SummaryLength};
