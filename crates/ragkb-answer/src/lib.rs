//! Grounded answering on top of the vector search: query variants, context
//! budgeting, prompts, citation arbitration, generation fallback, streaming
//! and the follow-up actions offered with each answer.

pub mod actions;
pub mod arbiter;
pub mod context;
pub mod generation;
pub mod knowledge;
pub mod pipeline;
pub mod prompt;
pub mod stream;
pub mod variants;

pub use actions::{suggest_actions, Action, ActionKind, FixTopic};
pub use arbiter::{CitationArbiter, INSUFFICIENT_INFORMATION, INVALID_SOURCES};
pub use context::{AssembledContext, ContextAssembler};
pub use generation::{ExtractiveGenerator, FallbackGenerator};
pub use knowledge::{KbFile, KnowledgeBase, MAX_FILE_BYTES};
pub use pipeline::{EvidenceSummary, RagAnswer, RagPipeline, NO_RELEVANT_INFORMATION};
pub use prompt::{chat_prompt, strip_control_tokens, ChatMessage, Role};
pub use stream::{stream_answer, StreamEvent, StreamOptions};
pub use variants::make_variants;
