//! System prompt and query shaping for upstream requests.

use super::message::{ChatRequest, system_message, user_message};
use crate::config::ContextConfig;

/// System prompt framing the upstream model as a codebase analyst.
pub const SYSTEM_PROMPT: &str = "You are a codebase analyst. Answer questions about the \
repository using only the code and documentation retrieved for you as context. Ground every \
claim in that context, name the files and symbols you rely on, and say so plainly when the \
context does not contain the answer. End your answer with a **Sources:** section listing each \
file you cited as a bullet of the form - `path/to/file`.";

/// Substrings (matched against the lowercased query) that suggest the caller
/// wants a repository overview.
///
/// Plain substring matching: "how many functions are in utils.py" triggers
/// the elaboration too.
pub const OVERVIEW_TRIGGERS: &[&str] = &["repo", "repository", "what", "how"];

/// Appended to queries that match [`OVERVIEW_TRIGGERS`].
pub const OVERVIEW_SUFFIX: &str = " Please describe the purpose of this repository, its overall \
architecture, and its key components.";

/// Returns the query as it is sent upstream.
#[must_use]
pub fn shape_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    if OVERVIEW_TRIGGERS.iter().any(|t| lowered.contains(t)) {
        format!("{query}{OVERVIEW_SUFFIX}")
    } else {
        query.to_string()
    }
}

/// Builds the streamed chat completion request for `query`.
#[must_use]
pub fn build_request(config: &ContextConfig, query: &str) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            system_message(SYSTEM_PROMPT),
            user_message(&shape_query(query)),
        ],
        stream: true,
        max_tokens: config.max_tokens,
    }
}
