use figment::providers::{Format, Toml};
use figment::Figment;
use tempfile::TempDir;

use ragkb_core::config::{resolve_with_base, BackendKind, Config, RagSettings, StreamSplit};
use ragkb_core::types::{ArbiterMode, DocumentMetadata, IndexedDocument, PartialCitationPolicy, SearchRequest};

fn config_from(toml: &str) -> Config {
    Config::from_figment(Figment::new().merge(Toml::string(toml)))
}

#[test]
fn rag_settings_default_when_table_missing() {
    let config = config_from("[other]\nvalue = 1\n");
    let settings = config.rag_settings().expect("settings");
    assert_eq!(settings, RagSettings::default());
    assert_eq!(settings.top_k, 3);
    assert_eq!(settings.arbiter, ArbiterMode::Rules);
    assert_eq!(settings.embed_cache_ttl_ms, 1_800_000);
}

#[test]
fn rag_settings_are_clamped() {
    let config = config_from(
        r#"
        [rag]
        top_k = 50
        query_variants = 9
        max_context_chars = 100
        arbiter = "llm"
        partial_citations = "strip"
        backend = "remote"

        [rag.stream]
        split = "word"
        "#,
    );
    let settings = config.rag_settings().expect("settings");
    assert_eq!(settings.top_k, 10);
    assert_eq!(settings.query_variants, 3);
    assert_eq!(settings.max_context_chars, 2000);
    assert_eq!(settings.arbiter, ArbiterMode::Llm);
    assert_eq!(settings.partial_citations, PartialCitationPolicy::Strip);
    assert_eq!(settings.backend, BackendKind::Remote);
    assert_eq!(settings.stream.split, StreamSplit::Word);
    assert_eq!(settings.stream.heartbeat_ms, 15_000, "unset nested keys keep defaults");
}

#[test]
fn rag_settings_reject_out_of_range_lambda() {
    let config = config_from("[rag]\nmmr_lambda = 1.5\n");
    let err = config.rag_settings().expect_err("lambda above 1 is invalid");
    assert_eq!(err.code(), "invalid_config");
}

#[test]
fn index_path_resolves_against_base() {
    let tmp = TempDir::new().unwrap();
    let settings = RagSettings::default();
    let resolved = settings.resolved_index_path(tmp.path());
    assert_eq!(resolved, tmp.path().join("vectorstore/index.json"));

    let absolute = tmp.path().join("abs.json");
    let absolute_str = absolute.to_string_lossy().to_string();
    assert_eq!(resolve_with_base(std::path::Path::new("/elsewhere"), &absolute_str), absolute);

    assert_eq!(settings.resolved_kb_dir(tmp.path()), tmp.path().join("knowledge_base"));
}

#[test]
fn artifact_document_keeps_unknown_metadata() {
    let doc: IndexedDocument = serde_json::from_str(
        r#"{"text":"hello","metadata":{"source":"kb/a.md","fullPath":"/srv/kb/a.md","chunk":2,"lang":"fr"}}"#,
    )
    .unwrap();
    assert_eq!(doc.metadata.source.as_deref(), Some("kb/a.md"));
    assert_eq!(doc.metadata.full_path.as_deref(), Some("/srv/kb/a.md"));
    assert_eq!(doc.metadata.chunk, Some(2));
    assert_eq!(doc.metadata.extra.get("lang").and_then(|v| v.as_str()), Some("fr"));

    let bare: IndexedDocument = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
    assert_eq!(bare.metadata, DocumentMetadata::default());
}

#[test]
fn search_request_defaults() {
    let req = SearchRequest::new(["how do I restart bind"]);
    assert_eq!(req.top_k, 3);
    assert_eq!(req.min_score, None);
    assert!(req.use_mmr);
    assert_eq!(req.preview_length, 220);
    assert!((req.mmr_lambda - 0.7).abs() < f32::EPSILON);
}
