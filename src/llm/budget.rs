//! Input size limits for model prompts.

/// Marker appended to text cut by [`truncate`].
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

/// Default character limit for full-document analysis.
pub const DEFAULT_ANALYSIS_CHARS: usize = 15_000;
/// Default character limit for summarization input.
pub const DEFAULT_SUMMARY_CHARS: usize = 8_000;
/// Default character limit for question-answering context.
pub const DEFAULT_ANSWER_CHARS: usize = 6_000;

/// Cut `text` to at most `limit` characters, appending [`TRUNCATION_MARKER`]
/// when anything was removed.
///
/// Counts Unicode scalar values and never splits one. The cut is not
/// sentence-aware.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        None => text.to_string(),
        Some((end, _)) => {
            let mut out = String::with_capacity(end + TRUNCATION_MARKER.len());
            out.push_str(&text[..end]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// Per-request character limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputBudget {
    pub analysis_chars: usize,
    pub summary_chars: usize,
    pub answer_chars: usize,
}

impl Default for InputBudget {
    fn default() -> Self {
        Self {
            analysis_chars: DEFAULT_ANALYSIS_CHARS,
            summary_chars: DEFAULT_SUMMARY_CHARS,
            answer_chars: DEFAULT_ANSWER_CHARS,
        }
    }
}

impl InputBudget {
    pub fn for_analysis(&self, text: &str) -> String {
        truncate(text, self.analysis_chars)
    }

    pub fn for_summary(&self, text: &str) -> String {
        truncate(text, self.summary_chars)
    }

    pub fn for_answer(&self, context: &str) -> String {
        truncate(context, self.answer_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_limit_is_unchanged() {
        for text in ["", "short", "exactly10!"] {
            assert_eq!(truncate(text, 10), text);
        }
    }

    #[test]
    fn test_over_limit_is_prefix_plus_marker() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let out = truncate(text, 10);
        assert_eq!(
            out.chars().count(),
            10 + TRUNCATION_MARKER.chars().count()
        );
        assert!(out.starts_with("abcdefghij"));
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert!(!out.starts_with("abcdefghijk"));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "ééééé";
        assert_eq!(truncate(text, 5), text);

        let out = truncate(text, 3);
        assert_eq!(out, format!("ééé{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_zero_limit() {
        assert_eq!(truncate("abc", 0), TRUNCATION_MARKER);
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn test_budget_defaults() {
        let budget = InputBudget::default();
        assert_eq!(budget.analysis_chars, 15_000);
        assert!(budget.summary_chars < budget.analysis_chars);
        assert!(budget.answer_chars < budget.analysis_chars);

        let long = "x".repeat(20_000);
        assert_eq!(
            budget.for_analysis(&long).chars().count(),
            15_000 + TRUNCATION_MARKER.chars().count()
        );
    }
}
