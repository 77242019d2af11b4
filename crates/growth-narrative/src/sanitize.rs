//! Cleanup of completion output before it enters the report.

use std::sync::OnceLock;

use regex::Regex;

/// Hard cap on summary length; anything beyond this is model rambling.
const MAX_SUMMARY_CHARS: usize = 4000;

fn html_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("valid regex"))
}

/// Strip HTML markup and control characters, trim, and cap the length.
///
/// Returns `None` when nothing readable survives, which callers treat the
/// same as a failed completion.
pub fn sanitize_summary(raw: &str) -> Option<String> {
    let without_tags = html_tag_pattern().replace_all(raw, "");

    let cleaned: String = without_tags
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().count() <= MAX_SUMMARY_CHARS {
        return Some(trimmed.to_string());
    }
    // Truncate on a char boundary, then back off to the last whitespace so
    // the cut does not land mid-word.
    let capped: String = trimmed.chars().take(MAX_SUMMARY_CHARS).collect();
    let end = capped
        .rfind(char::is_whitespace)
        .unwrap_or(capped.len());
    Some(capped[..end].trim_end().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
