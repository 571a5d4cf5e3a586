//! Audio acquisition phase: resolve, download, validate and persist the
//! pronunciation audio for every word in the input list.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use log::{error, info};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub mod fetcher;
pub mod resolver;
pub mod validator;

use crate::config::PipelineConfig;
use crate::errors::{AudioFailure, ResolveError};
use crate::events::{EventSink, Phase, PipelineEvent};
use crate::models::{AudioFile, AudioOutcome, RunReport, WordTask};
use crate::utils::common::audio_file_name;
use fetcher::AudioFetcher;
use resolver::AudioResolver;

/// Settings consumed by the download phase.
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub output_dir: PathBuf,
    pub anki_media_dir: Option<PathBuf>,
    pub concurrency: usize,
    pub retry_cap: u32,
    pub request_delay: Duration,
    pub backoff_base: Duration,
}

impl DownloadSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        DownloadSettings {
            output_dir: config.output_dir.clone(),
            anki_media_dir: config.anki_media_dir.clone(),
            concurrency: config.concurrency,
            retry_cap: config.retry_cap,
            request_delay: config.request_delay,
            backoff_base: config.backoff_base,
        }
    }
}

/// Drives resolver -> fetcher -> validator for each word over a bounded
/// worker pool and records every outcome in the run report.
pub struct DownloadOrchestrator {
    resolver: Arc<dyn AudioResolver>,
    fetcher: Arc<dyn AudioFetcher>,
    settings: DownloadSettings,
}

impl DownloadOrchestrator {
    pub fn new(
        resolver: Arc<dyn AudioResolver>,
        fetcher: Arc<dyn AudioFetcher>,
        settings: DownloadSettings,
    ) -> Self {
        DownloadOrchestrator {
            resolver,
            fetcher,
            settings,
        }
    }

    /// Process the task list. Per-word failures land in the report; only
    /// setup problems (an uncreatable output directory) surface as `Err`.
    pub async fn process(
        &self,
        tasks: &[WordTask],
        report: Arc<Mutex<RunReport>>,
        sink: Arc<dyn EventSink>,
        token: CancellationToken,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.settings.output_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create output directory {}",
                    self.settings.output_dir.display()
                )
            })?;

        let total = tasks.len();
        sink.emit(PipelineEvent::PhaseStarted {
            phase: Phase::Audio,
            total,
        });

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks.to_vec())));
        let done = Arc::new(AtomicUsize::new(0));
        let workers = self.settings.concurrency.max(1);

        info!("starting audio phase: {} words, {} workers", total, workers);

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let resolver = Arc::clone(&self.resolver);
            let fetcher = Arc::clone(&self.fetcher);
            let settings = self.settings.clone();
            let queue = Arc::clone(&queue);
            let report = Arc::clone(&report);
            let sink = Arc::clone(&sink);
            let token = token.clone();
            let done = Arc::clone(&done);

            handles.push(tokio::spawn(async move {
                worker_loop(
                    resolver, fetcher, settings, queue, report, sink, token, done, total,
                )
                .await;
            }));
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("download worker panicked: {e}");
            }
        }

        sink.emit(PipelineEvent::PhaseFinished { phase: Phase::Audio });
        Ok(())
    }
}

/// One worker: pull the next word, run it to a recorded outcome, repeat. The
/// cancellation token is honored before dequeuing; a word that has been
/// started always completes with a recorded outcome.
async fn worker_loop(
    resolver: Arc<dyn AudioResolver>,
    fetcher: Arc<dyn AudioFetcher>,
    settings: DownloadSettings,
    queue: Arc<Mutex<VecDeque<WordTask>>>,
    report: Arc<Mutex<RunReport>>,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
    done: Arc<AtomicUsize>,
    total: usize,
) {
    loop {
        if token.is_cancelled() {
            break;
        }
        let task = {
            let mut queue = queue.lock().unwrap();
            match queue.pop_front() {
                Some(task) => task,
                None => break,
            }
        };

        sink.emit(PipelineEvent::WordStarted {
            phase: Phase::Audio,
            word: task.display.clone(),
        });

        let outcome = process_word(&*resolver, &*fetcher, &settings, &token, &task).await;

        match &outcome {
            AudioOutcome::Succeeded(file) => {
                info!(
                    "downloaded audio for '{}' ({} bytes, {})",
                    task.display,
                    file.bytes,
                    file.format.extension()
                );
                sink.emit(PipelineEvent::WordSucceeded {
                    phase: Phase::Audio,
                    word: task.display.clone(),
                });
            }
            AudioOutcome::Failed { reason, attempts } => {
                info!(
                    "no audio for '{}' after {} attempt(s): {}",
                    task.display, attempts, reason
                );
                sink.emit(PipelineEvent::WordFailed {
                    phase: Phase::Audio,
                    word: task.display.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        report.lock().unwrap().record_audio(&task.key, outcome);

        let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
        sink.emit(PipelineEvent::Progress {
            phase: Phase::Audio,
            done: completed,
            total,
        });

        // Politeness floor between requests; no documented rate contract
        // exists for the dictionary site
        sleep(settings.request_delay).await;
    }
}

/// Run one word through resolve -> fetch -> validate -> persist. Transient
/// failures are retried in place up to the cap; everything else is final.
async fn process_word(
    resolver: &dyn AudioResolver,
    fetcher: &dyn AudioFetcher,
    settings: &DownloadSettings,
    token: &CancellationToken,
    task: &WordTask,
) -> AudioOutcome {
    let retry_cap = settings.retry_cap.max(1);
    let mut attempts: u32 = 0;

    // Resolving
    let mut resolve_attempts: u32 = 0;
    let locator = loop {
        resolve_attempts += 1;
        attempts += 1;
        match resolver.resolve(&task.display).await {
            Ok(locator) => break locator,
            Err(ResolveError::NotFound) => {
                return AudioOutcome::Failed {
                    reason: AudioFailure::ResolveNotFound,
                    attempts,
                };
            }
            Err(ResolveError::Fetch(failure)) => {
                if failure.is_transient() && resolve_attempts < retry_cap && !token.is_cancelled()
                {
                    sleep(backoff(settings.backoff_base, resolve_attempts)).await;
                    continue;
                }
                return AudioOutcome::Failed {
                    reason: AudioFailure::from_fetch(failure),
                    attempts,
                };
            }
        }
    };

    // Downloading
    let mut fetch_attempts: u32 = 0;
    let bytes = loop {
        fetch_attempts += 1;
        attempts += 1;
        match fetcher.fetch(&locator).await {
            Ok(bytes) => break bytes,
            Err(failure) => {
                if failure.is_transient() && fetch_attempts < retry_cap && !token.is_cancelled() {
                    sleep(backoff(settings.backoff_base, fetch_attempts)).await;
                    continue;
                }
                return AudioOutcome::Failed {
                    reason: AudioFailure::from_fetch(failure),
                    attempts,
                };
            }
        }
    };

    // Validating
    let format = match validator::validate(&bytes) {
        Ok(format) => format,
        Err(reason) => {
            return AudioOutcome::Failed {
                reason: AudioFailure::InvalidAudio(reason),
                attempts,
            };
        }
    };

    // Persist; the filename is derived from the word, so re-running a word
    // overwrites its previous file
    let file_name = audio_file_name(&task.key, format.extension());
    let path = settings.output_dir.join(&file_name);
    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        return AudioOutcome::Failed {
            reason: AudioFailure::WriteError(format!("{}: {}", path.display(), e)),
            attempts,
        };
    }

    // Mirror into the Anki media collection. The primary file is kept on a
    // copy failure; the word is still reported so the user can re-copy.
    if let Some(anki_dir) = &settings.anki_media_dir {
        let dest = anki_dir.join(&file_name);
        if let Err(e) = tokio::fs::copy(&path, &dest).await {
            return AudioOutcome::Failed {
                reason: AudioFailure::WriteError(format!(
                    "copy to Anki media folder {}: {}",
                    dest.display(),
                    e
                )),
                attempts,
            };
        }
    }

    AudioOutcome::Succeeded(AudioFile {
        path,
        bytes: bytes.len() as u64,
        format,
    })
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base * attempt
}
