//! Prompt construction for the answer, referee and chat calls.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use ragkb_core::types::Evidence;
use ragkb_vector::search::basename;

pub const DOC_OPEN: &str = "<<<DOC #";
pub const DOC_CLOSE: &str = "<<<END DOC>>>";
pub const DRAFT_HEADER: &str = "PROPOSED ANSWER:";
pub const INSTRUCTIONS_HEADER: &str = "INSTRUCTIONS:";

/// Longest user-supplied message kept in a chat prompt.
pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Number of trailing chat messages forwarded to the model.
pub const MAX_HISTORY: usize = 15;

const ANSWER_RULES: [&str; 5] = [
    "Rely STRICTLY on the CONTEXT provided.",
    "If a fact is not in the context, say so plainly (\"I did not find it\").",
    "Answer technically and concisely.",
    "Do NOT put 'Sources:' in the middle of the answer.",
    "End with exactly ONE line: Sources: <file1>, <file2>",
];

static CONTROL_TOKENS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*(SYSTEM|ASSISTANT|USER)\s*:\s*").ok());

/// Prompt asking the generator for a grounded answer over `context`.
pub fn answer_prompt(system: &str, question: &str, context: &[Evidence]) -> String {
    let docs = context
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{DOC_OPEN}{} source=\"{}\" score={:.3}>>>\n{}\n{DOC_CLOSE}",
                i + 1,
                basename(&c.source),
                c.score,
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let rules = ANSWER_RULES.join("\n- ");
    format!("SYSTEM:\n{system}\n\nRULES:\n- {rules}\n\nCONTEXT:\n{docs}\n\nQUESTION:\n{question}\n\nASSISTANT:")
        .trim()
        .to_string()
}

/// Second-pass prompt asking the generator to check `draft` against `context`.
pub fn referee_prompt(question: &str, context: &[Evidence], draft: &str) -> String {
    let docs = context
        .iter()
        .enumerate()
        .map(|(i, c)| format!("#{} [{}]\n{}", i + 1, basename(&c.source), c.text))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!(
        "SYSTEM:\nYou are a referee. Check that the proposed answer relies ONLY on the excerpts\n\
         provided. If needed, correct it so it sticks strictly to the context and ends\n\
         with 'Sources: <files>'.\n\n\
         CONTEXT:\n{docs}\n\n\
         QUESTION:\n{question}\n\n\
         {DRAFT_HEADER}\n{draft}\n\n\
         {INSTRUCTIONS_HEADER}\n\
         - Remove anything from the answer that is not present in the CONTEXT.\n\
         - End with 'Sources: <files>' listing only the files actually used (bare names)."
    )
}

/// Remove role markers a user could use to impersonate the prompt structure,
/// then cap the length.
pub fn strip_control_tokens(text: &str) -> String {
    let cleaned = match CONTROL_TOKENS.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    cleaned.chars().take(MAX_MESSAGE_CHARS).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Transcript prompt for free chat. Keeps the last [`MAX_HISTORY`] messages,
/// sanitized; returns `None` when nothing non-blank is left.
pub fn chat_prompt(system: &str, scope_rules: &str, messages: &[ChatMessage]) -> Option<String> {
    let start = messages.len().saturating_sub(MAX_HISTORY);
    let turns: Vec<String> = messages[start..]
        .iter()
        .map(|m| (m.role, strip_control_tokens(&m.content)))
        .filter(|(_, content)| !content.trim().is_empty())
        .map(|(role, content)| format!("{}: {content}", role.label()))
        .collect();
    if turns.is_empty() {
        return None;
    }
    Some(format!("SYSTEM:\n{system}\n\nRULES:\n{scope_rules}\n\n{}\nASSISTANT:", turns.join("\n")))
}
