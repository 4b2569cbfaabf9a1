//! Question to grounded answer: variants, retrieval, context, generation and
//! citation arbitration under one request deadline.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use uuid::Uuid;

use ragkb_core::config::RagSettings;
use ragkb_core::error::{Error, Result};
use ragkb_core::traits::GenerationProvider;
use ragkb_core::types::{Evidence, SearchRequest, Verdict};
use ragkb_vector::SearchBackend;

use crate::actions::{suggest_actions, Action};
use crate::arbiter::CitationArbiter;
use crate::context::ContextAssembler;
use crate::knowledge::KnowledgeBase;
use crate::prompt::answer_prompt;
use crate::variants::make_variants;

pub const NO_RELEVANT_INFORMATION: &str =
    "I could not find any relevant information in the knowledge base to answer precisely.";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a technical assistant answering from an internal knowledge base of operations notes.";

/// Evidence as shown to the user: score rendered with three decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub source: String,
    pub score: String,
    pub preview: String,
}

impl From<&Evidence> for EvidenceSummary {
    fn from(e: &Evidence) -> Self {
        Self { source: e.source.clone(), score: format!("{:.3}", e.score), preview: e.preview.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub reply: String,
    pub request_id: String,
    pub duration_ms: u64,
    pub sources: Vec<String>,
    pub evidence: Vec<EvidenceSummary>,
    /// `None` when no evidence survived and the generator was not called.
    pub verdict: Option<Verdict>,
    pub actions: Vec<Action>,
}

pub struct RagPipeline {
    backend: Arc<SearchBackend>,
    generator: Arc<dyn GenerationProvider>,
    arbiter: CitationArbiter,
    settings: RagSettings,
    system_prompt: String,
    kb: Option<KnowledgeBase>,
}

impl RagPipeline {
    pub fn new(backend: Arc<SearchBackend>, generator: Arc<dyn GenerationProvider>, settings: RagSettings) -> Self {
        let arbiter = CitationArbiter::new(settings.arbiter, settings.partial_citations);
        Self { backend, generator, arbiter, settings, system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(), kb: None }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Enables `show_file` actions for sources present in `kb`.
    pub fn with_knowledge_base(mut self, kb: KnowledgeBase) -> Self {
        self.kb = Some(kb);
        self
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn backend(&self) -> &Arc<SearchBackend> {
        &self.backend
    }

    /// Answer `question` within `request_timeout_ms`.
    ///
    /// Index, dimension and provider errors abort the request; citation
    /// rejections are returned as a normal answer with a rejecting verdict.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("empty question".into()));
        }
        let request_id = Uuid::new_v4().simple().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());
        let timeout_ms = self.settings.request_timeout_ms;
        let started = Instant::now();

        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.run(question, &request_id, started)).await {
            Ok(result) => result,
            Err(_) => {
                info!(target: "ragkb::chat", request_id = %request_id, ok = false, code = "timeout", timeout_ms, "chat");
                Err(Error::GenerationTimeout { timeout_ms })
            }
        }
    }

    async fn run(&self, question: &str, request_id: &str, started: Instant) -> Result<RagAnswer> {
        let s = &self.settings;
        let variants = make_variants(question, s.query_variants);
        let req = SearchRequest::new(variants)
            .with_top_k(s.top_k)
            .with_min_score(s.min_score)
            .with_mmr(true)
            .with_preview_length(s.preview_length)
            .with_lambda(s.mmr_lambda);
        let hits = self.backend.search(&req).await?;

        let context = ContextAssembler::new(s.max_context_chars).assemble(&hits);
        if context.is_empty() {
            let duration_ms = elapsed_ms(started);
            info!(target: "ragkb::chat", request_id, ok = true, mode = "rag:none", duration_ms, a_chars = 0, "chat");
            return Ok(RagAnswer {
                reply: NO_RELEVANT_INFORMATION.to_string(),
                request_id: request_id.to_string(),
                duration_ms,
                sources: Vec::new(),
                evidence: Vec::new(),
                verdict: None,
                actions: vec![Action::ask_for_logs()],
            });
        }

        let evidence: Vec<EvidenceSummary> = hits.iter().map(EvidenceSummary::from).collect();
        let sources = context.sources();
        let actions = suggest_actions(question, &sources, &context.entries, self.kb.as_ref());
        let prompt = answer_prompt(&self.system_prompt, question, &context.entries);
        let draft = self.generator.generate(&prompt).await?;
        let verdict = self.arbiter.arbitrate(self.generator.as_ref(), question, &context.entries, &draft).await;

        let duration_ms = elapsed_ms(started);
        let min = s.min_score.map_or_else(|| "off".to_string(), |m| m.to_string());
        info!(
            target: "ragkb::chat",
            request_id,
            ok = true,
            mode = %format!("rag(top_k={},min={min})", s.top_k),
            duration_ms,
            q_chars = question.chars().count(),
            a_chars = verdict.final_text.chars().count(),
            accepted = verdict.accepted,
            sources = ?sources,
            "chat"
        );
        Ok(RagAnswer {
            reply: verdict.final_text,
            request_id: request_id.to_string(),
            duration_ms,
            sources,
            evidence,
            verdict: Some(verdict.verdict),
            actions,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
