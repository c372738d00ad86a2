//! Structured analysis results.

use serde::{Deserialize, Serialize};

/// One section of an analyzed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Structured analysis of a document, as produced by the model.
///
/// `sections` and `key_findings` are always present after a successful
/// parse, though either may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub sections: Vec<Section>,
    #[serde(alias = "key_findings")]
    pub key_findings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
}

/// Requested summary length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Long => "long",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "short" => Some(SummaryLength::Short),
            "medium" => Some(SummaryLength::Medium),
            "long" => Some(SummaryLength::Long),
            _ => None,
        }
    }

    /// Prompt guidance describing the expected size.
    pub fn guidance(&self) -> &'static str {
        match self {
            SummaryLength::Short => "in 2-3 sentences",
            SummaryLength::Medium => "in one paragraph of 5-7 sentences",
            SummaryLength::Long => "in 3-4 paragraphs covering each major section",
        }
    }
}

impl std::fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = AnalysisRecord {
            title: "T".to_string(),
            authors: vec!["Ada".to_string()],
            abstract_text: "A".to_string(),
            sections: vec![],
            key_findings: vec!["k".to_string()],
            methodology: None,
            conclusions: None,
            references: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["abstract"], "A");
        assert_eq!(json["keyFindings"][0], "k");
        assert!(json.get("methodology").is_none());
    }

    #[test]
    fn test_summary_length_parsing() {
        assert_eq!(SummaryLength::from_str("SHORT"), Some(SummaryLength::Short));
        assert_eq!(SummaryLength::from_str("long"), Some(SummaryLength::Long));
        assert_eq!(SummaryLength::from_str("huge"), None);
        assert_eq!(SummaryLength::default(), SummaryLength::Medium);
    }
}
