//! Interpretation of raw model completions.
//!
//! The model is an untrusted producer. Everything it returns passes through
//! here before the rest of the application sees a typed value, and failures
//! are always reported rather than papered over with defaults.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::AnalysisRecord;

/// Errors from interpreting a model completion.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed model output: {reason}")]
    MalformedOutput { raw: String, reason: String },

    #[error("Model output violates the {schema} schema: {detail}")]
    SchemaViolation {
        schema: &'static str,
        detail: String,
        raw: String,
    },
}

impl ParseError {
    /// The raw completion that failed to parse.
    pub fn raw(&self) -> &str {
        match self {
            ParseError::MalformedOutput { raw, .. } | ParseError::SchemaViolation { raw, .. } => {
                raw
            }
        }
    }
}

/// Markdown fence around a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fence<'a> {
    /// ```` ```json ... ``` ````
    Tagged { lang: &'a str, body: &'a str },
    /// ```` ``` ... ``` ````
    Bare { body: &'a str },
    /// No fence.
    Unfenced(&'a str),
}

impl<'a> Fence<'a> {
    /// The text inside the fence, or the whole text when unfenced.
    pub fn body(&self) -> &'a str {
        match self {
            Fence::Tagged { body, .. } | Fence::Bare { body } => body,
            Fence::Unfenced(text) => text,
        }
    }
}

/// A whole-text fenced block: opening fence, optional language tag, body,
/// closing fence.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A```[ \t]*([A-Za-z0-9_+.-]*)[ \t]*(?:\r?\n)?(.*?)```\z").unwrap()
});

/// Classify already-trimmed text by its fencing.
pub fn classify_fence(text: &str) -> Fence<'_> {
    let Some(caps) = FENCE.captures(text) else {
        return Fence::Unfenced(text);
    };
    let lang = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str()).trim();
    if lang.is_empty() {
        Fence::Bare { body }
    } else {
        Fence::Tagged { lang, body }
    }
}

/// Required top-level keys of an analysis payload, with accepted spellings.
const ANALYSIS_REQUIRED: &[(&str, &[&str])] = &[
    ("title", &["title"]),
    ("authors", &["authors"]),
    ("abstract", &["abstract"]),
    ("sections", &["sections"]),
    ("keyFindings", &["keyFindings", "key_findings"]),
];

/// Parse a completion as an [`AnalysisRecord`].
pub fn parse_analysis(raw: &str) -> Result<AnalysisRecord, ParseError> {
    let trimmed = raw.trim();
    let body = classify_fence(trimmed).body();

    let value: Value = serde_json::from_str(body).map_err(|e| ParseError::MalformedOutput {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;

    let violation = |detail: String| ParseError::SchemaViolation {
        schema: "analysis",
        detail,
        raw: raw.to_string(),
    };

    let Some(object) = value.as_object() else {
        return Err(violation(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    };

    for (field, spellings) in ANALYSIS_REQUIRED {
        let present = spellings
            .iter()
            .any(|key| object.get(*key).is_some_and(|v| !v.is_null()));
        if !present {
            return Err(violation(format!("missing required field `{}`", field)));
        }
    }

    let mut value = value;
    if let Some(object) = value.as_object_mut() {
        normalize_key_findings(object);
    }
    serde_json::from_value(value).map_err(|e| violation(e.to_string()))
}

/// Leave exactly one `keyFindings` entry. The camelCase spelling wins when
/// both carry a value.
fn normalize_key_findings(object: &mut Map<String, Value>) {
    let alias = object.remove("key_findings");
    let has_camel = object.get("keyFindings").is_some_and(|v| !v.is_null());
    if let (false, Some(findings)) = (has_camel, alias) {
        object.insert("keyFindings".to_string(), findings);
    }
}

/// Parse a completion as a prose summary.
///
/// A fence wrapping the whole summary is removed.
pub fn parse_summary(raw: &str) -> Result<String, ParseError> {
    let body = classify_fence(raw.trim()).body().trim();
    if body.is_empty() {
        return Err(ParseError::MalformedOutput {
            raw: raw.to_string(),
            reason: "empty summary".to_string(),
        });
    }
    Ok(body.to_string())
}

/// Parse a completion as a free-text answer.
///
/// Fences are kept since answers may legitimately contain code.
pub fn parse_plain_answer(raw: &str) -> Result<String, ParseError> {
    let answer = raw.trim();
    if answer.is_empty() {
        return Err(ParseError::MalformedOutput {
            raw: raw.to_string(),
            reason: "empty answer".to_string(),
        });
    }
    Ok(answer.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;

    const PAYLOAD: &str = r#"{
        "title": "Attention Is All You Need",
        "authors": ["Ashish Vaswani", "Noam Shazeer"],
        "abstract": "We propose the Transformer.",
        "sections": [
            {"heading": "Introduction", "content": "RNNs are slow.", "summary": "Motivation"},
            {"heading": "Model", "content": "Stacked attention."}
        ],
        "keyFindings": ["Attention suffices", "Faster training"],
        "methodology": "Machine translation benchmarks"
    }"#;

    #[test]
    fn test_tagged_json_example_parses() {
        let raw = "```json\n{\"title\":\"T\",\"authors\":[],\"abstract\":\"A\",\"sections\":[],\"keyFindings\":[]}\n```";
        let record = parse_analysis(raw).unwrap();
        assert_eq!(
            record,
            AnalysisRecord {
                title: "T".to_string(),
                authors: vec![],
                abstract_text: "A".to_string(),
                sections: vec![],
                key_findings: vec![],
                methodology: None,
                conclusions: None,
                references: None,
            }
        );
    }

    #[test]
    fn test_fenced_and_unfenced_are_identical() {
        let plain = parse_analysis(PAYLOAD).unwrap();
        let tagged = parse_analysis(&format!("```json\n{}\n```", PAYLOAD)).unwrap();
        let bare = parse_analysis(&format!("  ```\n{}\n```\n", PAYLOAD)).unwrap();
        assert_eq!(plain, tagged);
        assert_eq!(plain, bare);

        assert_eq!(plain.authors.len(), 2);
        assert_eq!(
            plain.sections[1],
            Section {
                heading: "Model".to_string(),
                content: "Stacked attention.".to_string(),
                summary: None,
            }
        );
        assert_eq!(
            plain.methodology.as_deref(),
            Some("Machine translation benchmarks")
        );
        assert!(plain.conclusions.is_none());
    }

    #[test]
    fn test_missing_sections_is_schema_violation() {
        let raw = r#"{"title":"T","authors":[],"abstract":"A","keyFindings":[]}"#;
        match parse_analysis(raw) {
            Err(ParseError::SchemaViolation { detail, raw: kept, .. }) => {
                assert!(detail.contains("sections"));
                assert_eq!(kept, raw);
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
    }

    #[test]
    fn test_null_required_field_is_schema_violation() {
        let raw = r#"{"title":"T","authors":[],"abstract":"A","sections":null,"keyFindings":[]}"#;
        assert!(matches!(
            parse_analysis(raw),
            Err(ParseError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_wrong_type_is_schema_violation() {
        let raw = r#"{"title":"T","authors":"Ada","abstract":"A","sections":[],"keyFindings":[]}"#;
        assert!(matches!(
            parse_analysis(raw),
            Err(ParseError::SchemaViolation { .. })
        ));

        assert!(matches!(
            parse_analysis("[1, 2, 3]"),
            Err(ParseError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_garbage_is_malformed_with_raw_text() {
        let raw = "I'm sorry, I can't analyze this document.";
        let err = parse_analysis(raw).unwrap_err();
        assert!(matches!(err, ParseError::MalformedOutput { .. }));
        assert_eq!(err.raw(), raw);

        let truncated = "```json\n{\"title\": \"T\", \"authors\": [\n```";
        let err = parse_analysis(truncated).unwrap_err();
        assert!(matches!(err, ParseError::MalformedOutput { .. }));
        assert_eq!(err.raw(), truncated);
    }

    #[test]
    fn test_snake_case_findings_accepted() {
        let raw = r#"{"title":"T","authors":[],"abstract":"A","sections":[],"key_findings":["x"]}"#;
        let record = parse_analysis(raw).unwrap();
        assert_eq!(record.key_findings, vec!["x"]);
    }

    #[test]
    fn test_both_findings_spellings_accepted() {
        let raw = r#"{"title":"T","authors":[],"abstract":"A","sections":[],"keyFindings":["x"],"key_findings":["y"]}"#;
        let record = parse_analysis(raw).unwrap();
        assert_eq!(record.key_findings, vec!["x"]);

        let raw = r#"{"title":"T","authors":[],"abstract":"A","sections":[],"keyFindings":null,"key_findings":["y"]}"#;
        let record = parse_analysis(raw).unwrap();
        assert_eq!(record.key_findings, vec!["y"]);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let raw = r#"{"title":"T","authors":[],"abstract":"A","sections":[],"keyFindings":[],"confidence":0.9}"#;
        assert!(parse_analysis(raw).is_ok());
    }

    #[test]
    fn test_classify_fence() {
        assert_eq!(
            classify_fence("```json\n{}\n```"),
            Fence::Tagged {
                lang: "json",
                body: "{}"
            }
        );
        assert_eq!(classify_fence("```\n{}\n```"), Fence::Bare { body: "{}" });
        assert_eq!(classify_fence("```{}```"), Fence::Bare { body: "{}" });
        assert_eq!(classify_fence("{}"), Fence::Unfenced("{}"));
        assert_eq!(
            classify_fence("see ```json\n{}\n```"),
            Fence::Unfenced("see ```json\n{}\n```")
        );
    }

    #[test]
    fn test_parse_summary() {
        assert_eq!(
            parse_summary("\n  The paper shows X.  \n").unwrap(),
            "The paper shows X."
        );
        assert_eq!(
            parse_summary("```markdown\n- point one\n- point two\n```").unwrap(),
            "- point one\n- point two"
        );
        assert!(matches!(
            parse_summary("   "),
            Err(ParseError::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_summary("```\n```"),
            Err(ParseError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_parse_plain_answer_keeps_code() {
        let raw = "Use this:\n```rust\nfn main() {}\n```";
        assert_eq!(parse_plain_answer(raw).unwrap(), raw);
        assert!(parse_plain_answer("\n\n").is_err());
    }
}
