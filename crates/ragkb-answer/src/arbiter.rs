//! Citation checks on generated drafts.
//!
//! A draft is only trusted when its closing `Sources:` line cites files that
//! were actually handed to the generator. Rejections are ordinary verdicts: the
//! caller always gets some text back.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

use ragkb_core::traits::GenerationProvider;
use ragkb_core::types::{ArbiterMode, ArbitrationResult, Evidence, PartialCitationPolicy, Verdict};
use ragkb_vector::search::basename;

use crate::prompt::referee_prompt;

pub const INSUFFICIENT_INFORMATION: &str =
    "I could not find enough information in the knowledge base to answer precisely.";
pub const INVALID_SOURCES: &str =
    "Invalid answer (unrecognized sources). I could not find anything better in the knowledge base.";

static SOURCES_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)^\s*sources\s*:").ok());

/// Bare lowercase file name used to compare citations with evidence sources.
pub fn normalize_source(raw: &str) -> String {
    basename(raw.trim()).trim().to_lowercase()
}

/// Position and cited names of the closing `Sources:` line, if the draft has one.
///
/// Only the last non-blank line counts; a `Sources:` line followed by more
/// text is treated as missing.
pub fn parse_sources_line(draft: &str) -> Option<(usize, Vec<String>)> {
    let re = SOURCES_LINE.as_ref()?;
    let (idx, line) = draft.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()).last()?;
    let m = re.find(line)?;
    let cited = line[m.end()..]
        .split(|c: char| c == ',' || c == ';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some((idx, cited))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CitationArbiter {
    mode: ArbiterMode,
    policy: PartialCitationPolicy,
}

impl CitationArbiter {
    pub fn new(mode: ArbiterMode, policy: PartialCitationPolicy) -> Self {
        Self { mode, policy }
    }

    pub fn mode(&self) -> ArbiterMode {
        self.mode
    }

    /// Check `draft` against the sources of `context`, asking `referee` for a
    /// second pass in llm mode. Never fails.
    pub async fn arbitrate(
        &self,
        referee: &dyn GenerationProvider,
        question: &str,
        context: &[Evidence],
        draft: &str,
    ) -> ArbitrationResult {
        match self.mode {
            ArbiterMode::Off => ArbitrationResult { final_text: draft.to_string(), accepted: true, verdict: Verdict::Passed },
            ArbiterMode::Rules => {
                let allowed: Vec<String> = context.iter().map(|c| c.source.clone()).collect();
                self.check_rules(draft, &allowed)
            }
            ArbiterMode::Llm => {
                let prompt = referee_prompt(question, context, draft);
                match referee.generate(&prompt).await {
                    Ok(text) if !text.trim().is_empty() => {
                        debug!(model = referee.model_id(), "draft refereed");
                        ArbitrationResult { final_text: text, accepted: true, verdict: Verdict::Refereed }
                    }
                    Ok(_) => {
                        warn!(model = referee.model_id(), "referee returned an empty answer, keeping draft");
                        referee_failed(draft)
                    }
                    Err(e) => {
                        warn!(model = referee.model_id(), error = %e, code = e.code(), "referee pass failed, keeping draft");
                        referee_failed(draft)
                    }
                }
            }
        }
    }

    /// Rule-based check of the closing `Sources:` line against `allowed`.
    pub fn check_rules(&self, draft: &str, allowed: &[String]) -> ArbitrationResult {
        let Some((line_idx, cited)) = parse_sources_line(draft) else {
            return rejected(INSUFFICIENT_INFORMATION, Verdict::MissingSources);
        };
        if cited.is_empty() {
            return rejected(INSUFFICIENT_INFORMATION, Verdict::MissingSources);
        }

        let allowed: HashSet<String> = allowed.iter().map(|s| normalize_source(s)).collect();
        let (known, unknown): (Vec<String>, Vec<String>) =
            cited.into_iter().partition(|name| allowed.contains(&normalize_source(name)));

        if unknown.is_empty() {
            return ArbitrationResult { final_text: draft.to_string(), accepted: true, verdict: Verdict::Accepted };
        }
        let unknown: Vec<String> = unknown.iter().map(|s| basename(s)).collect();
        match self.policy {
            PartialCitationPolicy::Strip if !known.is_empty() => {
                debug!(removed = ?unknown, "stripping unknown citations");
                ArbitrationResult {
                    final_text: rewrite_sources_line(draft, line_idx, &known),
                    accepted: true,
                    verdict: Verdict::Stripped { removed: unknown },
                }
            }
            _ => rejected(INVALID_SOURCES, Verdict::UnknownSources { rejected: unknown }),
        }
    }
}

fn rejected(message: &str, verdict: Verdict) -> ArbitrationResult {
    ArbitrationResult { final_text: message.to_string(), accepted: false, verdict }
}

fn referee_failed(draft: &str) -> ArbitrationResult {
    ArbitrationResult { final_text: draft.to_string(), accepted: true, verdict: Verdict::RefereeFailed }
}

fn rewrite_sources_line(draft: &str, line_idx: usize, kept: &[String]) -> String {
    let body: Vec<&str> = draft.lines().take(line_idx).collect();
    let names: Vec<String> = kept.iter().map(|s| basename(s)).collect();
    let mut out = body.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str("Sources: ");
    out.push_str(&names.join(", "));
    out
}
