//! Reconstruction of a complete answer from a buffered SSE body.
//!
//! The upstream streams chat completion chunks as server-sent events. Several
//! payload shapes show up in practice (incremental deltas, whole messages,
//! bare `content` objects), so each event is probed against an ordered list
//! of [`ContentShape`]s and the first match contributes its text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Terminal marker sent by OpenAI-compatible streams.
const DONE_MARKER: &str = "[DONE]";

/// Heading that introduces the citation list. Matches `Sources:` and
/// `**Sources:**`.
static SOURCES_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:\*\*|__)?Sources:(?:\*\*|__)?\s*$").unwrap_or_else(|_| unreachable!())
});

/// One citation bullet: ``- `path` `` or ``* `path` ``.
static SOURCE_BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s+`([^`]+)`").unwrap_or_else(|_| unreachable!())
});

/// Answer text and citations recovered from a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    /// Concatenated answer text, including any trailing sources section.
    pub content: String,
    /// Citation identifiers in appearance order.
    pub sources: Vec<String>,
    /// Events that carried a JSON payload.
    pub events: usize,
    /// Events skipped because their payload was not valid JSON.
    pub malformed: usize,
}

/// Known payload shapes, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentShape {
    /// `choices[0].delta.content` (incremental chunk).
    Delta,
    /// `choices[0].message.content` (whole message).
    Message,
    /// Top-level `content`.
    Raw,
}

impl ContentShape {
    /// Probe order: first match wins.
    pub const ALL: [Self; 3] = [Self::Delta, Self::Message, Self::Raw];

    /// Returns the text this shape finds in `fragment`, if any.
    #[must_use]
    pub fn extract(self, fragment: &Value) -> Option<&str> {
        match self {
            Self::Delta => fragment.pointer("/choices/0/delta/content"),
            Self::Message => fragment.pointer("/choices/0/message/content"),
            Self::Raw => fragment.get("content"),
        }
        .and_then(Value::as_str)
    }

    /// Tries every shape in order and returns the first text found.
    #[must_use]
    pub fn first_match(fragment: &Value) -> Option<&str> {
        Self::ALL.iter().find_map(|shape| shape.extract(fragment))
    }
}

/// Splits a raw SSE body into event payloads.
///
/// Events are separated by a blank line (LF or CRLF). Within an event,
/// `data:` lines are joined with `\n`; `event:`, `id:`, `retry:` and comment
/// lines are dropped. An event with no field prefix at all is returned
/// verbatim. Empty payloads and the `[DONE]` marker are skipped.
#[must_use]
pub fn split_events(body: &str) -> Vec<String> {
    let normalized = body.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .filter_map(event_payload)
        .filter(|payload| !payload.is_empty() && payload != DONE_MARKER)
        .collect()
}

fn event_payload(event: &str) -> Option<String> {
    let event = event.trim();
    if event.is_empty() {
        return None;
    }

    let mut data_lines = Vec::new();
    let mut saw_field = false;
    for line in event.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            saw_field = true;
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.starts_with(':')
            || line.starts_with("event:")
            || line.starts_with("id:")
            || line.starts_with("retry:")
        {
            saw_field = true;
        }
    }

    if saw_field {
        Some(data_lines.join("\n").trim().to_string())
    } else {
        Some(event.to_string())
    }
}

/// Rebuilds the answer from a `text/event-stream` body.
///
/// Malformed events are logged and skipped; they never abort reconstruction.
#[must_use]
pub fn reconstruct(body: &str) -> Reconstruction {
    let mut result = Reconstruction::default();

    for payload in split_events(body) {
        let fragment: Value = match serde_json::from_str(&payload) {
            Ok(v) => v,
            Err(e) => {
                let err = FetchError::Parse {
                    message: e.to_string(),
                };
                warn!(error = %err, payload_len = payload.len(), "skipping malformed stream event");
                result.malformed += 1;
                continue;
            }
        };
        result.events += 1;

        if let Some(text) = ContentShape::first_match(&fragment) {
            result.content.push_str(text);
        }
    }

    result.sources = extract_sources(&result.content);
    debug!(
        events = result.events,
        malformed = result.malformed,
        content_len = result.content.len(),
        source_count = result.sources.len(),
        "stream reconstructed"
    );
    result
}

/// Extracts citation identifiers from the last `Sources:` section of `text`.
///
/// Bullets are read until the first non-blank line that is not a
/// backtick-quoted bullet. Duplicates are kept.
#[must_use]
pub fn extract_sources(text: &str) -> Vec<String> {
    let Some(heading) = SOURCES_HEADING.find_iter(text).last() else {
        return Vec::new();
    };

    let mut sources = Vec::new();
    for line in text[heading.end()..].lines() {
        if line.trim().is_empty() {
            continue;
        }
        match SOURCE_BULLET.captures(line) {
            Some(caps) => sources.push(caps[1].to_string()),
            None => break,
        }
    }
    sources
}
