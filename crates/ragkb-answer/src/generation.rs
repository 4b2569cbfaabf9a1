//! Generation providers: the rate-limit fallback mux and an offline extractive
//! generator used by the CLI and tests.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use ragkb_core::error::{Error, Result};
use ragkb_core::traits::{GenerationProvider, TextStream};

use crate::prompt::{DOC_CLOSE, DOC_OPEN, DRAFT_HEADER, INSTRUCTIONS_HEADER};

/// Retry hint used when a rate-limit message does not carry one.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

static RATE_LIMITED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b429\b|too many requests|quota|rate.?limit").ok());
static RETRY_AFTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)retry[\s_-]?(?:after|delay)["']?\s*[:=]?\s*["']?(\d+)"#).ok());

/// Map a raw provider failure message to an error kind.
///
/// Quota and throttling messages become [`Error::RateLimited`] with a retry
/// hint, everything else [`Error::Generation`]. Network provider adapters
/// call this on their failure bodies so that [`FallbackGenerator`] sees rate
/// limits as such.
pub fn classify_provider_message(message: &str) -> Error {
    let limited = RATE_LIMITED.as_ref().is_some_and(|re| re.is_match(message));
    if limited {
        Error::RateLimited { retry_after_secs: Some(parse_retry_after(message).unwrap_or(DEFAULT_RETRY_AFTER_SECS)) }
    } else {
        Error::Generation(message.to_string())
    }
}

/// Seconds from hints such as `retry after 12s`, `Retry-After: 30` or `"retryDelay": "12s"`.
pub fn parse_retry_after(message: &str) -> Option<u64> {
    let caps = RETRY_AFTER.as_ref()?.captures(message)?;
    caps.get(1)?.as_str().parse().ok()
}

/// Primary provider with an optional fallback that is only tried when the
/// primary is rate limited. Other failures are returned as is.
pub struct FallbackGenerator {
    primary: Arc<dyn GenerationProvider>,
    fallback: Option<Arc<dyn GenerationProvider>>,
}

impl FallbackGenerator {
    pub fn new(primary: Arc<dyn GenerationProvider>, fallback: Option<Arc<dyn GenerationProvider>>) -> Self {
        if let Some(fb) = &fallback {
            info!(primary = primary.model_id(), fallback = fb.model_id(), "generation models");
        }
        Self { primary, fallback }
    }

    fn fallback_for(&self, err: &Error) -> Option<&Arc<dyn GenerationProvider>> {
        match err {
            Error::RateLimited { retry_after_secs } => {
                let fb = self.fallback.as_ref()?;
                warn!(
                    primary = self.primary.model_id(),
                    fallback = fb.model_id(),
                    retry_after_secs = ?retry_after_secs,
                    "primary model rate limited, using fallback"
                );
                Some(fb)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl GenerationProvider for FallbackGenerator {
    fn model_id(&self) -> &str {
        self.primary.model_id()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        match self.primary.generate(prompt).await {
            Ok(text) => Ok(text),
            Err(e) => match self.fallback_for(&e) {
                Some(fb) => fb.generate(prompt).await,
                None => Err(e),
            },
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        match self.primary.generate_stream(prompt).await {
            Ok(s) => Ok(s),
            Err(e) => match self.fallback_for(&e) {
                Some(fb) => fb.generate_stream(prompt).await,
                None => Err(e),
            },
        }
    }
}

/// Answers from the prompt itself, without a model.
///
/// For answer prompts it quotes the opening sentences of the first document
/// and cites it; for referee prompts it returns the proposed answer unchanged;
/// anything else gets a short notice. Streaming yields the same text word by word.
pub struct ExtractiveGenerator {
    max_chars: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self { max_chars: 400 }
    }
}

impl ExtractiveGenerator {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars: max_chars.max(1) }
    }

    fn respond(&self, prompt: &str) -> String {
        if let Some(draft) = section(prompt, DRAFT_HEADER, INSTRUCTIONS_HEADER) {
            return draft.trim().to_string();
        }
        match first_document(prompt) {
            Some((source, text)) => {
                let excerpt = leading_sentences(text, self.max_chars);
                format!("{excerpt}\n\nSources: {source}")
            }
            None => "No model is configured; only knowledge base answers are available offline.".to_string(),
        }
    }
}

#[async_trait]
impl GenerationProvider for ExtractiveGenerator {
    fn model_id(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.respond(prompt))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        let text = self.respond(prompt);
        let mut pieces: Vec<Result<String>> = Vec::new();
        for (i, word) in text.split(' ').enumerate() {
            pieces.push(Ok(if i == 0 { word.to_string() } else { format!(" {word}") }));
        }
        Ok(stream::iter(pieces).boxed())
    }
}

fn section<'a>(prompt: &'a str, header: &str, next: &str) -> Option<&'a str> {
    let start = prompt.find(header)? + header.len();
    let rest = &prompt[start..];
    let end = rest.find(next).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn first_document(prompt: &str) -> Option<(&str, &str)> {
    let open = prompt.find(DOC_OPEN)?;
    let header_end = open + prompt[open..].find(">>>")?;
    let header = &prompt[open..header_end];
    let source = header.split("source=\"").nth(1)?.split('"').next()?;
    let body_start = header_end + ">>>".len();
    let body_end = body_start + prompt[body_start..].find(DOC_CLOSE)?;
    Some((source, prompt[body_start..body_end].trim()))
}

fn leading_sentences(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let clipped: String = flat.chars().take(max_chars).collect();
    let mut out = String::new();
    for (count, sentence) in clipped.split_inclusive(|c: char| c == '.' || c == '!' || c == '?').enumerate() {
        if count == 2 {
            break;
        }
        out.push_str(sentence);
    }
    out.trim().to_string()
}
