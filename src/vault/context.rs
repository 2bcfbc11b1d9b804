//! Grounded prompt assembly from search hits.
//!
//! Hits are numbered `[DOC 1]`, `[DOC 2]`, ... so an answer can cite them.
//! Sending the prompt to a language model is left to the caller.

use crate::vault::index::Hit;
use crate::vault::metadata::TITLE_KEY;

/// Placeholder docs block when nothing was retrieved.
pub const NO_MATCHES: &str = "No matching records found.";

const INSTRUCTIONS: &str = "You are MedGenie, a cautious medical assistant.
Rules:
- Use ONLY the provided docs for facts.
- If docs are insufficient, say what is missing.
- Add citations like [DOC 1], [DOC 2] after sentences they support.
- End with a short \"Next steps\" bullet list.";

/// Citation label and title for the hit at 0-based `position`.
pub fn citation(position: usize, hit: &Hit) -> (String, String) {
    let label = format!("DOC {}", position + 1);
    let title = hit
        .metadata
        .get(TITLE_KEY)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| label.clone());
    (label, title)
}

/// Render the docs block: one `[DOC n] title` header plus contents per hit.
pub fn build_context(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return NO_MATCHES.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let (label, title) = citation(i, hit);
            format!("[{label}] {title}\n{}", hit.contents)
                .trim()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full prompt for answering `question` from `hits`.
pub fn grounded_prompt(question: &str, hits: &[Hit]) -> String {
    format!(
        "{INSTRUCTIONS}\n\nQuestion:\n{}\n\nDocs:\n{}\n\nAnswer:",
        question.trim(),
        build_context(hits)
    )
}
