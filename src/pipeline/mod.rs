//! Two-phase pipeline controller: audio acquisition, then sentence
//! generation, merged into a single run report.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::config::{self, PipelineConfig, SentenceScope};
use crate::events::{EventSink, PipelineEvent};
use crate::models::{parse_word_list, RunReport, SentenceOutcome, WordTask};
use crate::services::audio::fetcher::{AudioFetcher, HttpAudioFetcher};
use crate::services::audio::resolver::{AudioResolver, OrdnetResolver};
use crate::services::audio::{DownloadOrchestrator, DownloadSettings};
use crate::services::export;
use crate::services::sentence::{ChatClient, GenerationSettings, OpenAiChat, SentenceGenerator};

pub const FAILED_WORDS_FILENAME: &str = "failed_words.txt";

/// Owns one run of the pipeline: sequences the phases, propagates the
/// cancellation token into both, and is the sole emitter of progress events
/// toward the presentation layer.
pub struct PipelineController {
    config: PipelineConfig,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
    resolver: Arc<dyn AudioResolver>,
    fetcher: Arc<dyn AudioFetcher>,
    chat: Option<Arc<dyn ChatClient>>,
}

impl PipelineController {
    /// Build a controller wired to the real network services.
    pub fn new(config: PipelineConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let client = config::http::build_client().context("failed to build HTTP client")?;
        let resolver: Arc<dyn AudioResolver> = Arc::new(OrdnetResolver::new(client.clone()));
        let fetcher: Arc<dyn AudioFetcher> = Arc::new(HttpAudioFetcher::new(client.clone()));
        let chat: Option<Arc<dyn ChatClient>> = config.api_key.as_ref().map(|key| {
            Arc::new(OpenAiChat::new(
                client,
                key.clone(),
                config.generation.clone(),
            )) as Arc<dyn ChatClient>
        });

        Ok(PipelineController {
            config,
            sink,
            token: CancellationToken::new(),
            resolver,
            fetcher,
            chat,
        })
    }

    /// Build a controller from caller-supplied components. Used by tests and
    /// by callers with their own transport.
    pub fn with_components(
        config: PipelineConfig,
        sink: Arc<dyn EventSink>,
        resolver: Arc<dyn AudioResolver>,
        fetcher: Arc<dyn AudioFetcher>,
        chat: Option<Arc<dyn ChatClient>>,
    ) -> Self {
        PipelineController {
            config,
            sink,
            token: CancellationToken::new(),
            resolver,
            fetcher,
            chat,
        }
    }

    /// Token callers use to cancel the run cooperatively.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run both phases over the raw word list text. Per-word failures land in
    /// the returned report; `Err` is reserved for setup problems such as an
    /// uncreatable output directory.
    pub async fn run(&self, raw_words: &str) -> Result<RunReport> {
        let tasks = parse_word_list(raw_words);
        info!("parsed {} unique words from input", tasks.len());

        let report = Arc::new(Mutex::new(RunReport::new(&tasks)));

        // Phase 1: audio acquisition
        let orchestrator = DownloadOrchestrator::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.fetcher),
            DownloadSettings::from_config(&self.config),
        );
        orchestrator
            .process(
                &tasks,
                Arc::clone(&report),
                Arc::clone(&self.sink),
                self.token.clone(),
            )
            .await?;

        self.write_failed_words(&report).await;

        // Phase 2: sentence generation
        if self.config.generate_sentences && !self.token.is_cancelled() {
            self.run_sentence_phase(&tasks, &report).await;
            self.write_export(&report).await;
        }

        let mut report = Arc::try_unwrap(report)
            .map(|mutex| mutex.into_inner().unwrap())
            .unwrap_or_else(|arc| arc.lock().unwrap().clone());
        report.finish();

        self.sink.emit(PipelineEvent::Log {
            message: format!("run finished: {}", report.summary()),
        });
        Ok(report)
    }

    async fn run_sentence_phase(&self, tasks: &[WordTask], report: &Arc<Mutex<RunReport>>) {
        let Some(chat) = &self.chat else {
            self.sink.emit(PipelineEvent::Log {
                message: "sentence generation requested but no credential configured; phase skipped"
                    .to_string(),
            });
            return;
        };

        let scope_tasks: Vec<WordTask> = match self.config.sentence_scope {
            SentenceScope::All => tasks.to_vec(),
            SentenceScope::AudioSuccesses => report.lock().unwrap().audio_survivors(),
        };

        // Words excluded by the scope are recorded, not silently dropped
        {
            let mut report = report.lock().unwrap();
            for task in tasks {
                if !scope_tasks.iter().any(|t| t.key == task.key) {
                    report.record_sentence(&task.key, SentenceOutcome::Skipped);
                }
            }
        }

        let generator = SentenceGenerator::new(
            Arc::clone(chat),
            GenerationSettings::from_config(&self.config),
        );
        generator
            .process(
                &scope_tasks,
                Arc::clone(report),
                Arc::clone(&self.sink),
                self.token.clone(),
            )
            .await;
    }

    /// Write the phase-1 failure list whenever at least one word failed. One
    /// file per run, overwritten.
    async fn write_failed_words(&self, report: &Arc<Mutex<RunReport>>) {
        let failed: Vec<String> = report
            .lock()
            .unwrap()
            .failed_audio_words()
            .iter()
            .map(|(word, _)| word.to_string())
            .collect();
        if failed.is_empty() {
            return;
        }

        let path = self.config.output_dir.join(FAILED_WORDS_FILENAME);
        let mut content = failed.join("\n");
        content.push('\n');
        match tokio::fs::write(&path, content).await {
            Ok(()) => info!("wrote {} failed words to {}", failed.len(), path.display()),
            Err(e) => {
                error!("failed to write {}: {}", path.display(), e);
                self.sink.emit(PipelineEvent::Log {
                    message: format!("could not write failed-words file: {e}"),
                });
            }
        }
    }

    /// Serialize export records for every successfully generated word.
    async fn write_export(&self, report: &Arc<Mutex<RunReport>>) {
        let Some(export_path) = &self.config.export_path else {
            return;
        };

        let csv = {
            let report = report.lock().unwrap();
            let records = report.succeeded_sentence_records();
            if records.is_empty() {
                self.sink.emit(PipelineEvent::Log {
                    message: "no sentence records to export".to_string(),
                });
                return;
            }
            let rows = export::build(&records, self.config.kept_sentences);
            info!(
                "exporting {} card rows for {} words",
                rows.len(),
                records.len()
            );
            export::serialize_csv(&rows)
        };

        if let Err(e) = tokio::fs::write(export_path, csv).await {
            error!("failed to write export file {}: {}", export_path.display(), e);
            self.sink.emit(PipelineEvent::Log {
                message: format!("could not write export file: {e}"),
            });
        }
    }
}
