// Configuration module
// Everything the pipeline consumes is passed in here explicitly; the core
// keeps no process-wide settings state.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod http;

/// CEFR proficiency band used to target example sentence difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }
}

impl Default for CefrLevel {
    fn default() -> Self {
        CefrLevel::B1
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("invalid CEFR level: {other}")),
        }
    }
}

impl std::fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which words the sentence phase runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SentenceScope {
    /// Only words whose audio download succeeded. Cards embed `[sound:...]`
    /// references, which only exist for these words.
    AudioSuccesses,
    /// Every word from the input list.
    All,
}

impl Default for SentenceScope {
    fn default() -> Self {
        SentenceScope::AudioSuccesses
    }
}

impl FromStr for SentenceScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "audio-successes" | "successes" => Ok(SentenceScope::AudioSuccesses),
            "all" => Ok(SentenceScope::All),
            other => Err(format!("invalid sentence scope: {other} (expected audio-successes or all)")),
        }
    }
}

/// Parameters for the chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// How many example sentences to request per word.
    pub sentences_per_word: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.7,
            sentences_per_word: 3,
        }
    }
}

/// Full configuration for one pipeline run. Built by the caller (the CLI
/// shell) and handed to `PipelineController` at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory validated audio files are written to.
    pub output_dir: PathBuf,
    /// Optional Anki media directory each audio file is mirrored into.
    pub anki_media_dir: Option<PathBuf>,
    /// Number of parallel download workers (kept small on purpose; the
    /// dictionary site publishes no rate contract).
    pub concurrency: usize,
    /// Maximum network attempts per transient-failing step.
    pub retry_cap: u32,
    /// Politeness delay each worker waits between words.
    pub request_delay: Duration,
    /// Base for the linear retry backoff (base * attempt).
    pub backoff_base: Duration,
    /// Whether to run the sentence-generation phase at all.
    pub generate_sentences: bool,
    pub sentence_scope: SentenceScope,
    pub cefr_level: CefrLevel,
    /// Credential for the generation endpoint; required when
    /// `generate_sentences` is set.
    pub api_key: Option<String>,
    /// Delay between consecutive generation calls.
    pub sentence_delay: Duration,
    pub generation: GenerationConfig,
    /// Where the Anki import CSV is written; `None` disables export.
    pub export_path: Option<PathBuf>,
    /// How many example sentences per word are kept as export records.
    pub kept_sentences: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            output_dir: PathBuf::from("danish_pronunciations"),
            anki_media_dir: None,
            concurrency: 2,
            retry_cap: 3,
            request_delay: Duration::from_millis(500),
            backoff_base: Duration::from_millis(500),
            generate_sentences: false,
            sentence_scope: SentenceScope::default(),
            cefr_level: CefrLevel::default(),
            api_key: None,
            sentence_delay: Duration::from_secs(1),
            generation: GenerationConfig::default(),
            export_path: None,
            kept_sentences: 2,
        }
    }
}
