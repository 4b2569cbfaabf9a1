//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys use `__`, e.g. `APP_RAG__TOP_K=5`). Typed pipeline settings live
//! under the `rag` key and fall back to defaults when absent.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{ArbiterMode, PartialCitationPolicy};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Pipeline settings from the `rag` table, clamped to their supported ranges.
    pub fn rag_settings(&self) -> Result<RagSettings> {
        let settings = match self.figment.extract_inner::<RagSettings>("rag") {
            Ok(s) => s,
            Err(e) if e.missing() => RagSettings::default(),
            Err(e) => return Err(Error::InvalidConfig(format!("Failed to get 'rag': {e}"))),
        };
        settings.validate()?;
        Ok(settings.clamped())
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        match env {
            "prod" | "production" => {
                let settings = self.rag_settings()?;
                if settings.arbiter == ArbiterMode::Off {
                    return Err(Error::InvalidConfig("citation arbiter must not be 'off' in production".into()));
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSplit {
    #[default]
    Chunk,
    Word,
    Char,
}

impl StreamSplit {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamSplit::Chunk => "chunk",
            StreamSplit::Word => "word",
            StreamSplit::Char => "char",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub split: StreamSplit,
    pub delay_ms: u64,
    pub heartbeat_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self { split: StreamSplit::Chunk, delay_ms: 0, heartbeat_ms: 15_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub backend: BackendKind,
    pub index_path: String,
    pub remote_index: Option<String>,
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub query_variants: usize,
    pub arbiter: ArbiterMode,
    pub partial_citations: PartialCitationPolicy,
    pub max_context_chars: usize,
    pub request_timeout_ms: u64,
    pub embed_cache_size: usize,
    pub embed_cache_ttl_ms: u64,
    pub preview_length: usize,
    pub mmr_lambda: f32,
    pub stream: StreamSettings,
    /// Directory holding the source documents the index was built from.
    pub kb_dir: String,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            index_path: "vectorstore/index.json".to_string(),
            remote_index: None,
            top_k: 3,
            min_score: None,
            query_variants: 1,
            arbiter: ArbiterMode::Rules,
            partial_citations: PartialCitationPolicy::Reject,
            max_context_chars: 8000,
            request_timeout_ms: 45_000,
            embed_cache_size: 200,
            embed_cache_ttl_ms: 30 * 60 * 1000,
            preview_length: 260,
            mmr_lambda: 0.7,
            stream: StreamSettings::default(),
            kb_dir: "knowledge_base".to_string(),
        }
    }
}

impl RagSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(Error::InvalidConfig(format!("mmr_lambda must be within [0, 1], got {}", self.mmr_lambda)));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be positive".into()));
        }
        if let Some(min) = self.min_score {
            if !min.is_finite() {
                return Err(Error::InvalidConfig("min_score must be a finite number".into()));
            }
        }
        Ok(())
    }

    /// Bound the tunables to the ranges the pipeline supports.
    pub fn clamped(mut self) -> Self {
        self.top_k = self.top_k.clamp(1, 10);
        self.query_variants = self.query_variants.clamp(1, 3);
        self.max_context_chars = self.max_context_chars.clamp(2000, 40_000);
        self.embed_cache_size = self.embed_cache_size.max(1);
        self
    }

    pub fn resolved_index_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.index_path)
    }

    pub fn resolved_kb_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.kb_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
