use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;

use ordlyd::config::{CefrLevel, PipelineConfig, SentenceScope};
use ordlyd::events::LogSink;
use ordlyd::pipeline::PipelineController;
use ordlyd::utils::logger;

#[derive(Parser, Debug)]
#[command(
    name = "ordlyd",
    version,
    about = "Download Danish pronunciation audio and build Anki cards with example sentences"
)]
struct Cli {
    /// File with one Danish word per line
    words_file: PathBuf,

    /// Directory audio files are written to
    #[arg(long, default_value = "danish_pronunciations")]
    output_dir: PathBuf,

    /// Anki media directory to mirror each audio file into
    #[arg(long)]
    anki_dir: Option<PathBuf>,

    /// CEFR level for generated example sentences
    #[arg(long, default_value = "B1")]
    cefr_level: CefrLevel,

    /// Credential for the generation endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Parallel download workers (capped at 4 out of politeness)
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Network attempts per transient-failing step
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Delay between requests per worker, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Generate example sentences after the audio phase
    #[arg(long)]
    sentences: bool,

    /// Which words the sentence phase covers: audio-successes or all
    #[arg(long, default_value = "audio-successes")]
    sentence_scope: SentenceScope,

    /// Write the Anki import CSV to this path
    #[arg(long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();
    let cli = Cli::parse();

    if cli.sentences && cli.api_key.is_none() {
        bail!("--sentences requires a credential (--api-key or OPENAI_API_KEY)");
    }

    let mut concurrency = cli.concurrency.max(1);
    if concurrency > 4 {
        warn!("capping concurrency at 4; the dictionary site publishes no rate contract");
        concurrency = 4;
    }

    let raw_words = tokio::fs::read_to_string(&cli.words_file)
        .await
        .with_context(|| format!("failed to read word list {}", cli.words_file.display()))?;

    let config = PipelineConfig {
        output_dir: cli.output_dir,
        anki_media_dir: cli.anki_dir,
        concurrency,
        retry_cap: cli.retries.max(1),
        request_delay: Duration::from_millis(cli.delay_ms.max(200)),
        generate_sentences: cli.sentences,
        sentence_scope: cli.sentence_scope,
        cefr_level: cli.cefr_level,
        api_key: cli.api_key,
        export_path: cli.export,
        ..PipelineConfig::default()
    };

    let controller = PipelineController::new(config, Arc::new(LogSink))?;

    // Ctrl-C requests cooperative cancellation; words in flight finish and
    // are recorded, nothing further is started
    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, letting in-flight words finish");
            token.cancel();
        }
    });

    let report = controller.run(&raw_words).await?;

    println!("{}", report.summary());
    let failed = report.failed_audio_words();
    if !failed.is_empty() {
        println!("words without audio:");
        for (word, reason) in failed {
            println!("  {word}: {reason}");
        }
    }

    Ok(())
}
