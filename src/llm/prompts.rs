//! System instructions and prompt templates.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::SummaryLength;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// System instruction for structured analysis sessions.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a research assistant that analyzes academic and technical documents.
You respond with a single JSON object and nothing else: no markdown, no code fences, no commentary."#;

/// Default template for structured analysis (uses {content} placeholder).
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"Analyze the following document and return a JSON object with exactly this shape:

{
  "title": "document title",
  "authors": ["author name", "..."],
  "abstract": "the abstract, or a 2-3 sentence overview if the document has none",
  "sections": [
    {"heading": "section heading", "content": "what the section covers", "summary": "one sentence"}
  ],
  "keyFindings": ["finding", "..."],
  "methodology": "how the work was done (omit if not applicable)",
  "conclusions": "main conclusions (omit if not applicable)",
  "references": ["notable cited work", "..."]
}

Rules:
1. "title", "authors", "abstract", "sections" and "keyFindings" are REQUIRED. Use an empty list when there are no authors, sections or findings.
2. Read the WHOLE document, not just the first page.
3. Keep each section "content" under 80 words.
4. If the text ends with a truncation marker, analyze what is present and do not invent the rest.

Document:
{content}"#;

/// System instruction for summarization sessions.
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You summarize documents accurately and concisely. Respond with plain prose only, without headings or preamble."#;

/// Default template for summaries (uses {length} and {content} placeholders).
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"Summarize the following text {length}. Focus on the main subject, the key results and why they matter.

Text:
{content}"#;

/// System instruction for question-answering sessions.
pub const ANSWER_SYSTEM_PROMPT: &str = r#"You answer questions about a document using only the context provided. If the context does not contain the answer, say so plainly instead of guessing."#;

/// Default template for answers (uses {context} and {question} placeholders).
pub const DEFAULT_ANSWER_PROMPT: &str = r#"Context:
{context}

Question: {question}

Answer:"#;

/// Substitute every named placeholder in one pass over the template.
///
/// Substituted text is never rescanned, so a document that happens to
/// contain `{question}` stays as written. Unknown placeholders are kept.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(name, _)| *name == &caps[1])
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Build the analysis prompt for already-budgeted text.
pub fn analysis_prompt(template: &str, content: &str) -> String {
    fill(template, &[("content", content)])
}

/// Build the summary prompt for already-budgeted text.
pub fn summary_prompt(template: &str, content: &str, length: SummaryLength) -> String {
    fill(
        template,
        &[("length", length.guidance()), ("content", content)],
    )
}

/// Build the question-answering prompt for already-budgeted context.
pub fn answer_prompt(template: &str, question: &str, context: &str) -> String {
    fill(
        template,
        &[("context", context), ("question", question.trim())],
    )
}
