//! Shared test doubles and fixtures for unit tests.

use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use tokio_util::sync::CancellationToken;

use crate::errors::{ApiFailure, FetchFailure, ResolveError};
use crate::events::{EventSink, PipelineEvent};
use crate::models::ResourceLocator;
use crate::services::audio::fetcher::AudioFetcher;
use crate::services::audio::resolver::AudioResolver;
use crate::services::sentence::ChatClient;

/// A small but well-formed WAV payload, comfortably above the validator's
/// size floor.
pub(crate) fn sample_wav() -> Vec<u8> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
        for i in 0..2048i32 {
            let t = i as f32 / 44100.0;
            let sample = ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 16000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    buffer.into_inner()
}

/// A generation reply in the exact labeled-section format the parser expects,
/// with two example sentences and complete noun grammar.
pub(crate) fn sample_reply(word: &str) -> String {
    format!(
        r#"**{word}**

**Grammar Info:**
IPA: /ˈtestˀ/
Type: substantiv
Gender: et
Plural: {word}e
Inflections: {word}et
Definition: noget man bruger i en test

**Example Sentences:**
1. Det er et {word}. - It is a {word}.
2. Jeg ser et {word} hver dag. - I see a {word} every day.
"#
    )
}

/// Sink that records every event for later assertions.
pub(crate) struct CollectingSink(pub(crate) Mutex<Vec<PipelineEvent>>);

impl CollectingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(CollectingSink(Mutex::new(Vec::new())))
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        self.0.lock().unwrap().push(event);
    }
}

/// Sink that drops everything.
pub(crate) struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: PipelineEvent) {}
}

/// Resolver scripted per word: words in `found` resolve to a locator, all
/// others are NotFound. Optionally cancels a token on its first call, for
/// cancellation tests.
pub(crate) struct ScriptedResolver {
    pub(crate) found: HashSet<String>,
    pub(crate) calls: AtomicU32,
    pub(crate) cancel_on_first_call: Option<CancellationToken>,
}

impl ScriptedResolver {
    pub(crate) fn finding(words: &[&str]) -> Self {
        ScriptedResolver {
            found: words.iter().map(|w| w.to_lowercase()).collect(),
            calls: AtomicU32::new(0),
            cancel_on_first_call: None,
        }
    }
}

#[async_trait]
impl AudioResolver for ScriptedResolver {
    async fn resolve(&self, word: &str) -> Result<ResourceLocator, ResolveError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            if let Some(token) = &self.cancel_on_first_call {
                token.cancel();
            }
        }
        if self.found.contains(&word.to_lowercase()) {
            Ok(ResourceLocator {
                url: format!("https://static.ordnet.dk/mp3/{}.mp3", word.to_lowercase()),
            })
        } else {
            Err(ResolveError::NotFound)
        }
    }
}

pub(crate) enum FetchScript {
    Bytes(Vec<u8>),
    AlwaysTransient,
    Permanent(u16),
}

/// Fetcher that follows a fixed script for every call.
pub(crate) struct ScriptedFetcher {
    pub(crate) script: FetchScript,
    pub(crate) calls: AtomicU32,
}

impl ScriptedFetcher {
    pub(crate) fn new(script: FetchScript) -> Self {
        ScriptedFetcher {
            script,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl AudioFetcher for ScriptedFetcher {
    async fn fetch(&self, _locator: &ResourceLocator) -> Result<Vec<u8>, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            FetchScript::Bytes(bytes) => Ok(bytes.clone()),
            FetchScript::AlwaysTransient => {
                Err(FetchFailure::Transient("connection reset".to_string()))
            }
            FetchScript::Permanent(status) => Err(FetchFailure::Permanent(*status)),
        }
    }
}

/// Chat client that replays a queue of canned results, one per call.
pub(crate) struct ScriptedChat {
    pub(crate) replies: Mutex<VecDeque<Result<String, ApiFailure>>>,
    pub(crate) calls: AtomicU32,
}

impl ScriptedChat {
    pub(crate) fn new(replies: Vec<Result<String, ApiFailure>>) -> Arc<Self> {
        Arc::new(ScriptedChat {
            replies: Mutex::new(replies.into()),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiFailure::Permanent("script exhausted".to_string())))
    }
}
