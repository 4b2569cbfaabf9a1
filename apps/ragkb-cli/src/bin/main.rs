use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ragkb_answer::{
    chat_prompt, stream_answer, ChatMessage, ExtractiveGenerator, KnowledgeBase, RagPipeline, StreamEvent, StreamOptions,
};
use ragkb_core::config::{Config, RagSettings, StreamSplit};
use ragkb_core::traits::GenerationProvider;
use ragkb_core::types::SearchRequest;
use ragkb_embed::{default_embedder, CachedEmbedder, QueryEmbeddingCache};
use ragkb_vector::SearchBackend;

const CHAT_SCOPE: &str =
    "If the question is outside the knowledge base scope (operations, Linux, networking, security), say so briefly and steer back.";

#[derive(Parser)]
#[command(name = "ragkb", about = "Question answering over a local knowledge base index")]
struct Cli {
    /// Directory relative index paths are resolved against.
    #[arg(long, env = "RAGKB_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank indexed passages for a query.
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        #[arg(long)]
        no_mmr: bool,
        /// Number of query phrasings to search with (1..=3).
        #[arg(long)]
        variants: Option<usize>,
    },
    /// Show index metadata.
    Stats,
    /// Reload the index artifact from disk.
    Reload,
    /// Check that the embedder and index are usable.
    Ready,
    /// Answer a question from the knowledge base.
    Ask { question: String },
    /// Print a knowledge base file (first 200 KB).
    File { source: String },
    /// Stream a chat reply.
    Stream {
        message: String,
        #[arg(long, value_parser = parse_split)]
        split: Option<StreamSplit>,
    },
}

fn parse_split(s: &str) -> Result<StreamSplit, String> {
    match s.to_ascii_lowercase().as_str() {
        "chunk" => Ok(StreamSplit::Chunk),
        "word" => Ok(StreamSplit::Word),
        "char" => Ok(StreamSplit::Char),
        other => Err(format!("unknown split mode {other:?} (chunk|word|char)")),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn build_backend(settings: &RagSettings, base: &std::path::Path) -> anyhow::Result<Arc<SearchBackend>> {
    let cache = QueryEmbeddingCache::new(settings.embed_cache_size, Duration::from_millis(settings.embed_cache_ttl_ms));
    let embedder = Arc::new(CachedEmbedder::new(default_embedder(), cache));
    Ok(Arc::new(SearchBackend::from_settings(settings, base, embedder, None)?))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let settings = config.rag_settings()?;
    let backend = build_backend(&settings, &cli.base_dir)?;

    match cli.command {
        Command::Search { query, top_k, min_score, no_mmr, variants } => {
            let n = variants.unwrap_or(settings.query_variants).clamp(1, 3);
            let req = SearchRequest::new(ragkb_answer::make_variants(&query, n))
                .with_top_k(top_k.unwrap_or(settings.top_k))
                .with_min_score(min_score.or(settings.min_score))
                .with_mmr(!no_mmr)
                .with_lambda(settings.mmr_lambda);
            let hits = backend.search(&req).await?;
            print_json(&hits)?;
        }
        Command::Stats => print_json(&backend.stats()?)?,
        Command::Reload => print_json(&backend.reload()?)?,
        Command::Ready => print_json(&backend.ensure_ready()?)?,
        Command::Ask { question } => {
            let kb = KnowledgeBase::new(settings.resolved_kb_dir(&cli.base_dir));
            let pipeline =
                RagPipeline::new(backend, Arc::new(ExtractiveGenerator::default()), settings).with_knowledge_base(kb);
            print_json(&pipeline.answer(&question).await?)?;
        }
        Command::File { source } => {
            let kb = KnowledgeBase::new(settings.resolved_kb_dir(&cli.base_dir));
            print_json(&kb.read(&source).await?)?;
        }
        Command::Stream { message, split } => {
            let mut opts = StreamOptions::from_settings(&settings);
            if let Some(split) = split {
                opts.split = split;
            }
            let prompt = chat_prompt(ragkb_answer::pipeline::DEFAULT_SYSTEM_PROMPT, CHAT_SCOPE, &[ChatMessage::user(message)])
                .ok_or_else(|| anyhow::anyhow!("empty message"))?;
            let generator: Arc<dyn GenerationProvider> = Arc::new(ExtractiveGenerator::default());
            let (tx, mut rx) = mpsc::channel(64);
            let cancel = CancellationToken::new();
            let producer = {
                let cancel = cancel.clone();
                tokio::spawn(async move { stream_answer(generator.as_ref(), &prompt, &opts, tx, cancel).await })
            };
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        cancel.cancel();
                        break;
                    }
                    ev = rx.recv() => match ev {
                        Some(StreamEvent::Delta(piece)) => {
                            print!("{piece}");
                            std::io::stdout().flush().ok();
                        }
                        Some(StreamEvent::Done { .. }) => println!(),
                        Some(other) => tracing::debug!(event = ?other, "stream event"),
                        None => break,
                    },
                }
            }
            producer.await??;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ragkb_core::Error>() {
            Some(err) => {
                let body = serde_json::json!({ "error": err.code(), "message": err.to_string(), "hint": err.hint() });
                eprintln!("{body}");
            }
            None => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}
