//! Rendering of fetch results into the text payload returned to MCP clients.
//!
//! Output is a pure function of the query and the [`FetchResult`], so
//! formatting the same result twice yields identical bytes.

use std::fmt::Write;

use crate::error::FetchError;
use crate::fetch::FetchResult;

/// Maximum characters of answer text shown to the client.
pub const DISPLAY_BUDGET: usize = 10_000;

/// A paragraph break before this many characters is too early to cut at.
const PARAGRAPH_CUT_FLOOR: usize = DISPLAY_BUDGET * 3 / 4;

/// Shown for 401 and 403.
pub const AUTH_ERROR_MESSAGE: &str = "Authentication failed: the configured API key was \
rejected. Check REPO_CONTEXT_API_KEY (or --api-key) and make sure the key has access to this \
service.";

/// Shown for 402.
pub const QUOTA_ERROR_MESSAGE: &str = "Quota exceeded: the API key has no remaining usage for \
this billing period. Upgrade the plan or wait for the quota to reset.";

/// Formats `result` for the client that asked `query`.
#[must_use]
pub fn format_response(query: &str, result: &FetchResult) -> String {
    if let Some(status) = result.status_code {
        return format_failure(status, &result.content);
    }

    let mut output = format!("Context for \"{query}\":\n\n");
    output.push_str(&truncate_for_display(&result.content));

    if !result.sources.is_empty() {
        output.push_str("\n\nSources:\n");
        for source in &result.sources {
            let _ = writeln!(output, "- {source}");
        }
        output.truncate(output.trim_end_matches('\n').len());
    }

    output
}

fn format_failure(status: u16, detail: &str) -> String {
    match FetchError::from_status(status) {
        FetchError::Auth { .. } => AUTH_ERROR_MESSAGE.to_string(),
        FetchError::Quota => QUOTA_ERROR_MESSAGE.to_string(),
        _ if detail.is_empty() => format!("HTTP error {status} from the context service."),
        _ => format!("HTTP error {status}: {detail}"),
    }
}

/// Truncates `content` to [`DISPLAY_BUDGET`] characters.
///
/// Prefers the last paragraph break (`\n\n`) before the limit when it lies
/// past 75% of the budget; otherwise cuts hard at the limit and appends
/// `...`. A note with the original length follows any truncation.
#[must_use]
pub fn truncate_for_display(content: &str) -> String {
    let total = content.chars().count();
    if total <= DISPLAY_BUDGET {
        return content.to_string();
    }

    let limit = content
        .char_indices()
        .nth(DISPLAY_BUDGET)
        .map_or(content.len(), |(idx, _)| idx);
    let window = &content[..limit];

    let paragraph_cut = window
        .rfind("\n\n")
        .filter(|&idx| window[..idx].chars().count() > PARAGRAPH_CUT_FLOOR);

    let mut output = match paragraph_cut {
        Some(idx) => window[..idx].to_string(),
        None => format!("{window}..."),
    };
    let _ = write!(
        output,
        "\n\n[Response truncated for display; original length {total} characters]"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn answer(content: &str, sources: &[&str]) -> FetchResult {
        FetchResult::answer(
            content.to_string(),
            sources.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    #[test]
    fn test_success_layout() {
        let output = format_response("find main", &answer("It is in src/main.rs.", &[]));
        assert_eq!(output, "Context for \"find main\":\n\nIt is in src/main.rs.");
    }

    #[test]
    fn test_sources_section_in_engine_order() {
        let output = format_response("q", &answer("Body", &["b.rs", "a.rs", "b.rs"]));
        assert_eq!(
            output,
            "Context for \"q\":\n\nBody\n\nSources:\n- b.rs\n- a.rs\n- b.rs"
        );
    }

    #[test]
    fn test_auth_statuses() {
        for status in [401, 403] {
            let output = format_response("q", &FetchResult::http_status(status));
            assert_eq!(output, AUTH_ERROR_MESSAGE);
        }
    }

    #[test]
    fn test_quota_status() {
        let output = format_response("q", &FetchResult::http_status(402));
        assert_eq!(output, QUOTA_ERROR_MESSAGE);
    }

    #[test]
    fn test_other_status() {
        let output = format_response("q", &FetchResult::http_status(503));
        assert_eq!(output, "HTTP error 503 from the context service.");
    }

    #[test]
    fn test_synthesized_failure_keeps_detail() {
        let output = format_response("q", &FetchResult::timed_out(5));
        assert!(output.starts_with("HTTP error 408: Request timed out after 5 attempts"));
    }

    #[test]
    fn test_short_content_untouched() {
        let content = "a".repeat(DISPLAY_BUDGET);
        assert_eq!(truncate_for_display(&content), content);
    }

    #[test]
    fn test_truncates_at_late_paragraph_break() {
        let mut content = "a".repeat(9_500);
        content.push_str("\n\n");
        content.push_str(&"b".repeat(12_000 - content.len()));
        assert_eq!(content.len(), 12_000);

        let output = truncate_for_display(&content);
        let (body, note) = output
            .split_once("\n\n[")
            .unwrap_or_else(|| unreachable!());
        assert_eq!(body.len(), 9_500);
        assert!(body.chars().all(|c| c == 'a'));
        assert!(note.contains("12000"));
    }

    #[test]
    fn test_hard_cut_when_break_is_early() {
        let mut content = "a".repeat(5_000);
        content.push_str("\n\n");
        content.push_str(&"b".repeat(12_000 - content.len()));

        let output = truncate_for_display(&content);
        let (body, note) = output
            .split_once("\n\n[Response truncated")
            .unwrap_or_else(|| unreachable!());
        assert_eq!(body.chars().count(), DISPLAY_BUDGET + 3);
        assert!(body.ends_with("b..."));
        assert!(note.contains("12000"));
    }

    #[test]
    fn test_hard_cut_without_any_break() {
        let content = "x".repeat(12_000);
        let output = truncate_for_display(&content);
        assert!(output.starts_with(&format!("{}...", "x".repeat(DISPLAY_BUDGET))));
        assert!(output.ends_with("original length 12000 characters]"));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let content = "é".repeat(DISPLAY_BUDGET + 1);
        let output = truncate_for_display(&content);
        assert!(output.starts_with(&format!("{}...", "é".repeat(DISPLAY_BUDGET))));
        assert!(output.contains(&(DISPLAY_BUDGET + 1).to_string()));
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let result = answer(&"para\n\n".repeat(3_000), &["src/lib.rs"]);
        assert_eq!(
            format_response("how", &result),
            format_response("how", &result)
        );
    }

    proptest! {
        #[test]
        fn prop_display_body_is_bounded(content in "[a-z\\n ]{0,12000}") {
            let body = truncate_for_display(&content);
            let note_len = "\n\n[Response truncated for display; original length 12000 characters]".len();
            prop_assert!(body.chars().count() <= DISPLAY_BUDGET + 3 + note_len);
        }

        #[test]
        fn prop_format_is_deterministic(
            query in ".{0,40}",
            content in ".{0,200}",
            sources in proptest::collection::vec("[a-z/.]{1,20}", 0..4),
            status in proptest::option::of(400u16..600),
        ) {
            let result = FetchResult { content, sources, status_code: status };
            prop_assert_eq!(format_response(&query, &result), format_response(&query, &result));
        }
    }
}
